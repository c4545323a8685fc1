//! Token bucket rate limiter shared by all outbound calls
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `refill_per_second`. Every acquisition consumes one token; when the bucket
//! is empty the caller is suspended until enough time has passed for one
//! token to accumulate, or until its cancellation token fires.
//!
//! Refill and consumption happen under one lock, so concurrent acquirers can
//! never over-admit, and a cancelled acquisition never consumes a token.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Clock, SystemClock};
use crate::error::StructuredError;

/// Tolerance for floating point drift in the refill computation
const TOKEN_EPSILON: f64 = 1e-9;

/// Lower bound on a single wait so a waiter always makes progress
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Longest single suspension; the loop re-checks the bucket afterwards
const MAX_WAIT: Duration = Duration::from_secs(3_600);

/// Configuration for the token bucket
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Maximum burst size
    pub capacity: u32,
    /// Steady-state admission rate
    pub refill_per_second: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { capacity: 20, refill_per_second: 10.0 }
    }
}

impl RateLimiterConfig {
    pub fn new(refill_per_second: f64, capacity: u32) -> Self {
        Self { capacity, refill_per_second }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.capacity == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if !self.refill_per_second.is_finite() || self.refill_per_second <= 0.0 {
            return Err(RateLimitError::InvalidConfiguration(
                "refill_per_second must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors surfaced by the rate limiter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    #[error("rate limiter acquisition cancelled")]
    Cancelled,

    #[error("no rate limiter capacity within {0:?}")]
    TimedOut(Duration),

    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<RateLimitError> for StructuredError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Cancelled => StructuredError::cancelled(),
            RateLimitError::TimedOut(after) => StructuredError::timeout("rate limiter acquire", after),
            RateLimitError::InvalidConfiguration(message) => StructuredError::config(message),
        }
    }
}

/// Result of a successful acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Time spent suspended waiting for capacity
    pub waited: Duration,
    /// Whether the bucket was empty when the caller arrived
    pub throttled: bool,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimiterConfig) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            let capacity = f64::from(config.capacity);
            self.tokens = (self.tokens + elapsed * config.refill_per_second).min(capacity);
            self.last_refill = now;
        }
    }

    /// Consume one token, or report how long until one is available
    fn take(&mut self, config: &RateLimiterConfig) -> Result<(), Duration> {
        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            let wait = Duration::try_from_secs_f64(missing / config.refill_per_second)
                .unwrap_or(MAX_WAIT);
            Err(wait.clamp(MIN_WAIT, MAX_WAIT))
        }
    }
}

/// Token bucket admission gate
///
/// # Examples
///
/// ```rust
/// use logrelay_common::resilience::{RateLimiterConfig, TokenBucket};
///
/// let limiter = TokenBucket::new(RateLimiterConfig::new(10.0, 5)).unwrap();
/// for _ in 0..5 {
///     assert!(limiter.try_acquire());
/// }
/// assert!(!limiter.try_acquire());
/// ```
#[derive(Debug)]
pub struct TokenBucket<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    state: Mutex<Bucket>,
    clock: C,
}

impl TokenBucket<SystemClock> {
    /// Create a token bucket driven by the tokio timer
    pub fn new(config: RateLimiterConfig) -> Result<Self, RateLimitError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a token bucket with a custom clock; starts full
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Result<Self, RateLimitError> {
        config.validate()?;
        let bucket = Bucket { tokens: f64::from(config.capacity), last_refill: clock.now() };
        Ok(Self { config, state: Mutex::new(bucket), clock })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Consume one token without waiting
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.state.lock();
        bucket.refill(self.clock.now(), &self.config);
        bucket.take(&self.config).is_ok()
    }

    /// Tokens currently available (fractional while refilling)
    pub fn available(&self) -> f64 {
        let mut bucket = self.state.lock();
        bucket.refill(self.clock.now(), &self.config);
        bucket.tokens
    }

    /// Consume one token, suspending until capacity exists
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Cancelled`] if `cancel` fires first. A
    /// cancelled call leaves the bucket untouched.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Admission, RateLimitError> {
        self.acquire_until(None, cancel).await
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`
    ///
    /// # Errors
    ///
    /// [`RateLimitError::TimedOut`] when no token frees up in time.
    pub async fn acquire_within(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Admission, RateLimitError> {
        self.acquire_until(self.clock.now().checked_add(timeout), cancel).await
    }

    /// Consume one token, giving up at `deadline`
    ///
    /// A wait that would run past the deadline sleeps until the deadline and
    /// then fails, so the caller never returns early. `None` waits
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// [`RateLimitError::Cancelled`] or [`RateLimitError::TimedOut`]; neither
    /// consumes a token.
    pub async fn acquire_until(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<Admission, RateLimitError> {
        let started = self.clock.now();
        let mut throttled = false;

        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }

            let (wait, now) = {
                let mut bucket = self.state.lock();
                let now = self.clock.now();
                bucket.refill(now, &self.config);
                match bucket.take(&self.config) {
                    Ok(()) => {
                        let waited = now.saturating_duration_since(started);
                        trace!(remaining = bucket.tokens, ?waited, "rate limiter admitted call");
                        return Ok(Admission { waited, throttled });
                    }
                    Err(wait) => (wait, now),
                }
            };

            if !throttled {
                debug!(?wait, "rate limiter exhausted, waiting for capacity");
                throttled = true;
            }

            let mut pause = wait;
            let mut expires = false;
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(now);
                if wait > remaining {
                    pause = remaining;
                    expires = true;
                }
            }

            if !pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                    _ = self.clock.sleep(pause) => {}
                }
            }

            if expires {
                let budget = deadline.map_or(pause, |d| d.saturating_duration_since(started));
                debug!(?budget, "rate limiter deadline reached");
                return Err(RateLimitError::TimedOut(budget));
            }
        }
    }

    /// Refill the bucket to full capacity
    pub fn reset(&self) {
        let mut bucket = self.state.lock();
        bucket.tokens = f64::from(self.config.capacity);
        bucket.last_refill = self.clock.now();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::MockClock;
    use super::*;

    fn limiter(rate: f64, burst: u32) -> (TokenBucket<MockClock>, MockClock) {
        let clock = MockClock::new();
        let bucket = TokenBucket::with_clock(RateLimiterConfig::new(rate, burst), clock.clone())
            .expect("valid config");
        (bucket, clock)
    }

    #[test]
    fn starts_full_and_drains() {
        let (bucket, _clock) = limiter(10.0, 5);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        assert!(bucket.available() < 1.0);
    }

    #[test]
    fn refills_continuously_and_caps_at_capacity() {
        let (bucket, clock) = limiter(10.0, 5);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }

        clock.advance_millis(250);
        let available = bucket.available();
        assert!((available - 2.5).abs() < 1e-6, "got {available}");

        clock.advance(Duration::from_secs(60));
        assert!((bucket.available() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn admissions_never_exceed_bound() {
        let (bucket, clock) = limiter(4.0, 3);
        let mut admitted = 0u32;
        // 2 seconds in 10ms steps
        for _ in 0..200 {
            if bucket.try_acquire() {
                admitted += 1;
            }
            clock.advance_millis(10);
        }
        // capacity + rate * elapsed
        assert!(admitted <= 3 + 8, "admitted {admitted}");
        assert!(bucket.available() >= 0.0);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let (bucket, clock) = limiter(10.0, 5);
        let cancel = CancellationToken::new();

        for _ in 0..5 {
            let admission = bucket.acquire(&cancel).await.unwrap();
            assert!(!admission.throttled);
            assert_eq!(admission.waited, Duration::ZERO);
        }

        let sixth = bucket.acquire(&cancel).await.unwrap();
        assert!(sixth.throttled);
        let waited_ms = sixth.waited.as_secs_f64() * 1000.0;
        assert!((waited_ms - 100.0).abs() < 1.0, "waited {waited_ms}ms");
        assert_eq!(clock.total_slept(), sixth.waited);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_acquire_leaves_bucket_unchanged() {
        let bucket = Arc::new(TokenBucket::new(RateLimiterConfig::new(0.5, 1)).unwrap());
        assert!(bucket.try_acquire());
        let before = bucket.available();

        let cancel = CancellationToken::new();
        let waiter = {
            let bucket = Arc::clone(&bucket);
            let cancel = cancel.clone();
            tokio::spawn(async move { bucket.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(RateLimitError::Cancelled));
        // only the passage of time changed the bucket
        let after = bucket.available();
        assert!(after >= before && after < 1.0, "before {before}, after {after}");
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_within_times_out() {
        let bucket = TokenBucket::new(RateLimiterConfig::new(0.1, 1)).unwrap();
        assert!(bucket.try_acquire());

        let result = bucket.acquire_within(Duration::from_secs(1), &CancellationToken::new()).await;
        assert_eq!(result, Err(RateLimitError::TimedOut(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn acquire_until_sleeps_to_the_deadline_then_gives_up() {
        let (bucket, clock) = limiter(1.0, 1);
        assert!(bucket.try_acquire());

        let deadline = clock.now() + Duration::from_millis(300);
        let result = bucket.acquire_until(Some(deadline), &CancellationToken::new()).await;

        assert_eq!(result, Err(RateLimitError::TimedOut(Duration::from_millis(300))));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(300)]);
        assert!(bucket.available() < 1.0);
    }

    #[tokio::test]
    async fn tiny_rate_waits_are_capped() {
        let (bucket, clock) = limiter(1e-20, 1);
        assert!(bucket.try_acquire());

        let result = bucket.acquire_within(Duration::from_secs(10), &CancellationToken::new()).await;

        assert_eq!(result, Err(RateLimitError::TimedOut(Duration::from_secs(10))));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
        assert_eq!(bucket.state.lock().take(&bucket.config), Err(MAX_WAIT));
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(TokenBucket::new(RateLimiterConfig::new(10.0, 0)).is_err());
        assert!(TokenBucket::new(RateLimiterConfig::new(0.0, 5)).is_err());
        assert!(TokenBucket::new(RateLimiterConfig::new(f64::NAN, 5)).is_err());
    }

    #[test]
    fn errors_convert_to_structured() {
        let err: StructuredError = RateLimitError::Cancelled.into();
        assert!(err.is_cancelled());
    }
}
