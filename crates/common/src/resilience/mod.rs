//! Resilience patterns for outbound calls
//!
//! - **Clock**: injectable time source so waits are testable without real
//!   delays
//! - **Token bucket**: admission gate shared by all concurrent callers
//! - **Retry**: bounded retry with exponential backoff, jitter, `Retry-After`
//!   and one-shot re-authentication on `401`
//!
//! Every wait in this module is cancellable through a
//! [`tokio_util::sync::CancellationToken`].

pub mod clock;
pub mod rate_limiter;
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock};
pub use rate_limiter::{Admission, RateLimitError, RateLimiterConfig, TokenBucket};
pub use retry::{
    RetryConfigError, RetryExecutor, RetryPolicy, RetryPolicyBuilder, RetryableError,
    DEFAULT_RETRYABLE_STATUS_CODES,
};
