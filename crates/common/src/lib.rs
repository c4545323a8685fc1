//! Generic building blocks shared across LogRelay crates.
//!
//! Nothing in this crate knows about the remote logging API; it provides the
//! error taxonomy, time abstraction, admission control, retry and
//! instrumentation traits the client layer is assembled from.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: structured error taxonomy
//! - `runtime`: async infrastructure (clock, rate limiter, retry,
//!   instrumentation sinks)
//! - `observability`: tracing (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod observability;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{
    ErrorCategory, ErrorClassification, ErrorCode, ErrorSeverity, StructuredError,
    StructuredResult,
};
#[cfg(feature = "runtime")]
pub use observability::{AuditSink, MetricsSink, ToolExecution};
#[cfg(feature = "runtime")]
pub use resilience::{
    Clock, MockClock, RateLimiterConfig, RetryExecutor, RetryPolicy, SystemClock, TokenBucket,
};
