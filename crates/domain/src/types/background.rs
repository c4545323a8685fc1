//! Background query records and their status state machine
//!
//! ```text
//! Submitted ──► Running ──► Completed
//!     │            ├──────► Failed
//!     └────────────┴──────► Cancelled
//! ```
//!
//! Transitions only move forward. Once a query is terminal its status never
//! changes again.

use chrono::{DateTime, Utc};
use logrelay_common::error::StructuredError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::impl_status_conversions;

/// Local lifecycle state of a background query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl_status_conversions!(QueryStatus {
    Submitted => "submitted",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled" | "canceled",
});

impl QueryStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Map a status string reported by the remote API
    ///
    /// The remote side has no separate "submitted" phase once it has
    /// accepted a query, so every non-terminal remote state maps to
    /// `Running`. Unknown strings yield `None`.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "queued" | "submitted" | "pending" | "running" | "in_progress" => Some(Self::Running),
            "completed" | "succeeded" | "success" | "done" => Some(Self::Completed),
            "failed" | "error" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Attempted move out of a terminal state or backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid background query transition from {from} to {to}")]
pub struct TransitionError {
    pub from: QueryStatus,
    pub to: QueryStatus,
}

impl From<TransitionError> for StructuredError {
    fn from(err: TransitionError) -> Self {
        StructuredError::invalid_input(err.to_string())
    }
}

/// What to run in the background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundQuerySpec {
    pub query: String,
    /// Query language identifier passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl BackgroundQuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), syntax: None, start_date: None, end_date: None }
    }

    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

/// Tracked background query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundQuery {
    pub id: String,
    pub spec: BackgroundQuerySpec,
    pub status: QueryStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Remote status metadata from the last completed poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
}

impl BackgroundQuery {
    pub fn new(
        id: impl Into<String>,
        spec: BackgroundQuerySpec,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            spec,
            status: QueryStatus::Submitted,
            submitted_at,
            last_polled_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`
    ///
    /// Returns `Ok(true)` when the status changed, `Ok(false)` when `next`
    /// equals the current status.
    ///
    /// # Errors
    ///
    /// [`TransitionError`] for moves out of a terminal state or backwards.
    pub fn transition(
        &mut self,
        next: QueryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if next == self.status {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(TransitionError { from: self.status, to: next });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(at);
        }
        Ok(true)
    }

    pub fn record_poll(&mut self, at: DateTime<Utc>) {
        self.last_polled_at = Some(at);
    }

    /// Transition to `Failed` carrying the remote error
    ///
    /// # Errors
    ///
    /// [`TransitionError`] when already terminal.
    pub fn fail(
        &mut self,
        error: StructuredError,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError { from: self.status, to: QueryStatus::Failed });
        }
        self.transition(QueryStatus::Failed, at)?;
        self.error = Some(error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> BackgroundQuery {
        BackgroundQuery::new("q-1", BackgroundQuerySpec::new("source logs | limit 10"), Utc::now())
    }

    #[test]
    fn forward_transitions_succeed() {
        let mut q = query();
        assert_eq!(q.transition(QueryStatus::Running, Utc::now()), Ok(true));
        assert_eq!(q.transition(QueryStatus::Running, Utc::now()), Ok(false));
        assert_eq!(q.transition(QueryStatus::Completed, Utc::now()), Ok(true));
        assert!(q.is_terminal());
        assert!(q.finished_at.is_some());
    }

    #[test]
    fn submitted_may_jump_to_terminal() {
        let mut q = query();
        assert_eq!(q.transition(QueryStatus::Cancelled, Utc::now()), Ok(true));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [QueryStatus::Completed, QueryStatus::Failed, QueryStatus::Cancelled] {
            let mut q = query();
            q.transition(terminal, Utc::now()).unwrap();
            let all = [
                QueryStatus::Submitted,
                QueryStatus::Running,
                QueryStatus::Completed,
                QueryStatus::Failed,
                QueryStatus::Cancelled,
            ];
            for next in all {
                if next == terminal {
                    continue;
                }
                let err = q.transition(next, Utc::now()).unwrap_err();
                assert_eq!(err, TransitionError { from: terminal, to: next });
            }
            assert_eq!(q.status, terminal);
        }
    }

    #[test]
    fn running_cannot_go_back() {
        let mut q = query();
        q.transition(QueryStatus::Running, Utc::now()).unwrap();
        assert!(q.transition(QueryStatus::Submitted, Utc::now()).is_err());
    }

    #[test]
    fn fail_attaches_error() {
        let mut q = query();
        q.fail(StructuredError::api("query exploded"), Utc::now()).unwrap();
        assert_eq!(q.status, QueryStatus::Failed);
        assert_eq!(q.error.as_ref().map(|e| e.message.as_str()), Some("query exploded"));
        assert!(q.fail(StructuredError::api("again"), Utc::now()).is_err());
    }

    #[test]
    fn failed_query_keeps_first_error() {
        let mut q = query();
        q.transition(QueryStatus::Running, Utc::now()).unwrap();
        q.fail(StructuredError::api("first"), Utc::now()).unwrap();
        let finished_at = q.finished_at;

        let err = q.fail(StructuredError::api("second"), Utc::now()).unwrap_err();
        assert_eq!(err.from, QueryStatus::Failed);
        assert_eq!(q.error.as_ref().map(|e| e.message.as_str()), Some("first"));
        assert_eq!(q.finished_at, finished_at);
    }

    #[test]
    fn remote_status_mapping() {
        assert_eq!(QueryStatus::from_remote("QUEUED"), Some(QueryStatus::Running));
        assert_eq!(QueryStatus::from_remote("submitted"), Some(QueryStatus::Running));
        assert_eq!(QueryStatus::from_remote("succeeded"), Some(QueryStatus::Completed));
        assert_eq!(QueryStatus::from_remote("error"), Some(QueryStatus::Failed));
        assert_eq!(QueryStatus::from_remote("canceled"), Some(QueryStatus::Cancelled));
        assert_eq!(QueryStatus::from_remote("mystery"), None);
    }

    #[test]
    fn local_status_strings_round_trip() {
        assert_eq!(QueryStatus::Cancelled.to_string(), "cancelled");
        assert_eq!("canceled".parse::<QueryStatus>(), Ok(QueryStatus::Cancelled));
        assert_eq!(serde_json::to_string(&QueryStatus::Running).unwrap(), "\"running\"");
    }

    #[test]
    fn spec_serializes_camel_case() {
        let spec = BackgroundQuerySpec::new("source logs").with_syntax("dataprime");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["query"], "source logs");
        assert_eq!(json["syntax"], "dataprime");
        assert!(json.get("startDate").is_none());
    }
}
