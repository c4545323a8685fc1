//! Bounded retry with exponential backoff, jitter and `Retry-After` support
//!
//! [`RetryExecutor::execute`] invokes an operation up to
//! `policy.max_attempts` times. A failure is retried only when its HTTP
//! status is in the policy's retryable set (or it is a transport failure that
//! never produced a status) and attempts remain.
//!
//! Backoff for retry `n` (1-based) is `min(max_wait, min_wait * 2^(n-1))`
//! plus uniform jitter in `[0, wait / 2]`. A server-provided `Retry-After`
//! replaces the computed delay.
//!
//! A `401` is handled separately: the executor invokes the caller's
//! re-authentication hook once and replays the operation without backoff. A
//! second `401` within the same logical call surfaces unchanged. The
//! recovery replay does not consume the transient-retry budget.
//!
//! Exhausted retries surface the last error as-is, tagged with the number of
//! retries performed.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{Clock, SystemClock};
use crate::error::StructuredError;
use crate::observability::{MetricsSink, NoOpMetrics};

/// Status codes retried by default
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

const UNAUTHORIZED: u16 = 401;

/// Invalid retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid retry configuration: {message}")]
pub struct RetryConfigError {
    pub message: String,
}

/// Immutable retry configuration shared read-only by all callers
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    pub retryable_status_codes: BTreeSet<u16>,
    /// Add uniform jitter in `[0, wait / 2]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        if self.min_wait > self.max_wait {
            return Err(RetryConfigError {
                message: format!(
                    "min_wait ({:?}) must not exceed max_wait ({:?})",
                    self.min_wait, self.max_wait
                ),
            });
        }
        Ok(())
    }

    /// Backoff before retry number `retry` (1-based), before jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.min_wait.saturating_mul(1u32 << shift).min(self.max_wait)
    }

    /// Add jitter in `[0, wait / 2]` when enabled
    pub fn apply_jitter(&self, wait: Duration) -> Duration {
        if !self.jitter {
            return wait;
        }
        let max_jitter_ms = u64::try_from(wait.as_millis() / 2).unwrap_or(u64::MAX);
        if max_jitter_ms == 0 {
            return wait;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        wait + Duration::from_millis(jitter_ms)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn min_wait(mut self, wait: Duration) -> Self {
        self.policy.min_wait = wait;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.policy.max_wait = wait;
        self
    }

    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.policy.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.policy.jitter = false;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, RetryConfigError> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// What the executor needs to know about an operation's error
pub trait RetryableError: Sized {
    /// HTTP status of the failed response, if there was one
    fn status_code(&self) -> Option<u16>;

    /// Server-requested delay before the next attempt
    fn retry_after_hint(&self) -> Option<Duration>;

    /// Failure before any response arrived (connect reset, DNS, ...)
    fn is_transport_failure(&self) -> bool;

    /// Error returned when the caller cancels mid-retry
    fn cancelled() -> Self;

    /// Tag the surfaced error with the number of retries performed
    fn with_retries(self, retries: u32) -> Self;

    /// Error returned when the caller's deadline arrives before the next
    /// attempt; `self` is the last attempt's error
    fn deadline_exceeded(self) -> Self;
}

impl RetryableError for StructuredError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn retry_after_hint(&self) -> Option<Duration> {
        self.retry_after
    }

    fn is_transport_failure(&self) -> bool {
        self.status.is_none() && self.code == crate::error::ErrorCode::NetworkError
    }

    fn cancelled() -> Self {
        StructuredError::cancelled()
    }

    fn with_retries(self, retries: u32) -> Self {
        self.with_retry_count(retries)
    }

    fn deadline_exceeded(self) -> Self {
        let message = format!("deadline reached before the next attempt; last error: {}", self.message);
        let last = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        StructuredError::new(crate::error::ErrorCode::Timeout, message)
            .with_details(serde_json::json!({ "last_error": last }))
    }
}

/// Retry executor parameterised by clock for deterministic tests
pub struct RetryExecutor<C: Clock = SystemClock> {
    policy: RetryPolicy,
    clock: C,
    metrics: Arc<dyn MetricsSink>,
}

impl<C: Clock> fmt::Debug for RetryExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").field("policy", &self.policy).finish_non_exhaustive()
    }
}

impl RetryExecutor<SystemClock> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_clock(policy, SystemClock)
    }
}

impl<C: Clock> RetryExecutor<C> {
    pub fn with_clock(policy: RetryPolicy, clock: C) -> Self {
        Self { policy, clock, metrics: Arc::new(NoOpMetrics) }
    }

    /// Report every retry to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn should_retry<E: RetryableError>(&self, error: &E) -> bool {
        match error.status_code() {
            Some(status) => self.policy.is_retryable_status(status),
            None => error.is_transport_failure(),
        }
    }

    /// Run `operation` with retry
    ///
    /// `operation` receives the 1-based call number. `reauthenticate` is
    /// invoked at most once, after the first `401`.
    ///
    /// # Errors
    ///
    /// The last operation error (tagged with the retry count), the
    /// re-authentication error, or `E::cancelled()` if `cancel` fires during
    /// an attempt or a backoff wait.
    pub async fn execute<T, E, Op, Fut, Re, ReFut>(
        &self,
        cancel: &CancellationToken,
        operation: Op,
        reauthenticate: Re,
    ) -> Result<T, E>
    where
        E: RetryableError + fmt::Display,
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Re: FnMut() -> ReFut,
        ReFut: Future<Output = Result<(), E>>,
    {
        self.execute_until(None, cancel, operation, reauthenticate).await
    }

    /// [`execute`](Self::execute) bounded by `deadline`
    ///
    /// A backoff that would end past the deadline sleeps until the deadline
    /// and then surfaces `E::deadline_exceeded()` instead of another attempt.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus the deadline error.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
    pub async fn execute_until<T, E, Op, Fut, Re, ReFut>(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        mut operation: Op,
        mut reauthenticate: Re,
    ) -> Result<T, E>
    where
        E: RetryableError + fmt::Display,
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Re: FnMut() -> ReFut,
        ReFut: Future<Output = Result<(), E>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut budget_used: u32 = 0;
        let mut calls: u32 = 0;
        let mut reauthenticated = false;

        loop {
            if cancel.is_cancelled() {
                return Err(E::cancelled());
            }

            budget_used += 1;
            calls += 1;
            debug!(call = calls, attempt = budget_used, max_attempts, "executing operation");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(E::cancelled()),
                result = operation(calls) => result,
            };

            let error = match result {
                Ok(value) => {
                    if calls > 1 {
                        debug!(retries = calls - 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.status_code() == Some(UNAUTHORIZED) {
                if reauthenticated {
                    warn!("unauthorized again after credential refresh, giving up");
                    return Err(error.with_retries(calls - 1));
                }
                reauthenticated = true;
                warn!("unauthorized response, forcing credential refresh");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(E::cancelled()),
                    refreshed = reauthenticate() => refreshed?,
                }
                self.metrics.record_retry();
                budget_used -= 1;
                continue;
            }

            if !self.should_retry(&error) {
                debug!(error = %error, "error is not retryable");
                return Err(error.with_retries(calls - 1));
            }

            if budget_used >= max_attempts {
                warn!(attempts = budget_used, error = %error, "retry attempts exhausted");
                return Err(error.with_retries(calls - 1));
            }

            let delay = match error.retry_after_hint() {
                Some(server_delay) => server_delay,
                None => self.policy.apply_jitter(self.policy.backoff(budget_used)),
            };

            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(self.clock.now());
                if delay >= remaining {
                    warn!(?delay, ?remaining, error = %error, "deadline reached before next attempt");
                    if !remaining.is_zero() {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(E::cancelled()),
                            _ = self.clock.sleep(remaining) => {}
                        }
                    }
                    return Err(error.deadline_exceeded().with_retries(calls - 1));
                }
            }

            warn!(attempt = budget_used, ?delay, error = %error, "operation failed, retrying");
            self.metrics.record_retry();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(E::cancelled()),
                _ = self.clock.sleep(delay) => {}
            }
        }
    }
}
