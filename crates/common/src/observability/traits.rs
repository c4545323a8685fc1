//! Trait abstractions for instrumentation collaborators
//!
//! The client layer reports to these sinks synchronously and never waits on
//! anything beyond the call itself. Concrete backends (the `metrics` facade,
//! `tracing` audit events) live in the infra crate.

use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

mod timestamp_ms {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::ser::Error as SerError;
    use serde::{Deserialize, Deserializer, Serializer};

    type SerializerResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(timestamp: &SystemTime, serializer: S) -> SerializerResult<S>
    where
        S: Serializer,
    {
        let duration = timestamp
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SerError::custom("timestamp predates unix epoch"))?;
        let millis = u64::try_from(duration.as_millis()).map_err(|_| {
            SerError::custom("timestamp does not fit into 64-bit millisecond representation")
        })?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Request-level metrics reported by the client
pub trait MetricsSink: Send + Sync + Debug {
    /// One completed logical call (after retries)
    fn record_request(&self, success: bool, latency: Duration, status_code: Option<u16>);

    /// One retry attempt, including the forced-refresh replay after a 401
    fn record_retry(&self);

    /// A caller had to wait for rate limiter capacity
    fn record_rate_limit_hit(&self);
}

/// No-op metrics sink for tests or when metrics are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsSink for NoOpMetrics {
    fn record_request(&self, _success: bool, _latency: Duration, _status_code: Option<u16>) {}

    fn record_retry(&self) {}

    fn record_rate_limit_hit(&self) {}
}

// ============================================================================
// Audit
// ============================================================================

/// Audit record for one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub name: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub success: bool,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "timestamp_ms")]
    pub timestamp: SystemTime,
}

impl ToolExecution {
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            resource: None,
            success: true,
            duration: Duration::ZERO,
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Mark the execution failed with `error`
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

impl Default for ToolExecution {
    fn default() -> Self {
        Self {
            name: String::new(),
            operation: String::new(),
            resource: None,
            success: true,
            duration: Duration::ZERO,
            error: None,
            timestamp: UNIX_EPOCH,
        }
    }
}

/// Sink for tool-execution audit records
pub trait AuditSink: Send + Sync + Debug {
    fn log_tool_execution(&self, execution: ToolExecution);

    fn is_enabled(&self) -> bool {
        true
    }
}

/// No-op audit sink for tests or when auditing is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAudit;

impl AuditSink for NoOpAudit {
    fn log_tool_execution(&self, _execution: ToolExecution) {}

    fn is_enabled(&self) -> bool {
        false
    }
}
