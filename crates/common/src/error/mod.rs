//! Structured error taxonomy shared by every LogRelay layer
//!
//! Every failed outbound call surfaces exactly one [`StructuredError`]. The
//! error carries a machine-readable [`ErrorCode`], the [`ErrorCategory`] the
//! code belongs to, a human-readable message and, for every code, an
//! actionable suggestion that a tool handler can relay verbatim.
//!
//! # Categories
//!
//! | Category | Meaning | Codes |
//! |----------|---------|-------|
//! | **Client** | Caller's fault | `InvalidInput`, `Unauthorized`, `Forbidden`, `ResourceNotFound`, `Conflict`, `RateLimitExceeded`, `Cancelled` |
//! | **Server** | Internal to this layer | `Timeout`, `ServiceUnavailable`, `Internal`, `Config` |
//! | **External** | Remote API, network or auth provider | `ApiError`, `NetworkError`, `AuthFailed` |
//!
//! # ErrorClassification
//!
//! [`ErrorClassification`] gives callers a uniform way to ask whether a
//! failure is transient, how severe it is and whether the remote side asked
//! for a specific retry delay:
//!
//! ```rust
//! use logrelay_common::error::{ErrorClassification, ErrorCode, StructuredError};
//!
//! let err = StructuredError::new(ErrorCode::RateLimitExceeded, "slow down");
//! assert!(err.is_retryable());
//! assert_eq!(err.suggestion.as_deref(), Some("Wait and retry; the API rate limit was exceeded"));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type using [`StructuredError`]
pub type StructuredResult<T> = Result<T, StructuredError>;

/// Who is responsible for a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad input, missing auth, not found, conflict, rate-limited
    Client,
    /// Failures inside this layer (timeouts, misconfiguration)
    Server,
    /// The remote API, the network or the auth provider
    External,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    Unauthorized,
    Forbidden,
    ResourceNotFound,
    Conflict,
    RateLimitExceeded,
    #[serde(rename = "APIError")]
    ApiError,
    NetworkError,
    AuthFailed,
    Cancelled,
    Timeout,
    ServiceUnavailable,
    Internal,
    Config,
}

impl ErrorCode {
    /// Category this code always belongs to
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidInput
            | Self::Unauthorized
            | Self::Forbidden
            | Self::ResourceNotFound
            | Self::Conflict
            | Self::RateLimitExceeded
            | Self::Cancelled => ErrorCategory::Client,
            Self::ApiError | Self::NetworkError | Self::AuthFailed => ErrorCategory::External,
            Self::Timeout | Self::ServiceUnavailable | Self::Internal | Self::Config => {
                ErrorCategory::Server
            }
        }
    }

    /// Stable string form used in logs and metric labels
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::Conflict => "Conflict",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::ApiError => "APIError",
            Self::NetworkError => "NetworkError",
            Self::AuthFailed => "AuthFailed",
            Self::Cancelled => "Cancelled",
            Self::Timeout => "Timeout",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Internal => "Internal",
            Self::Config => "Config",
        }
    }

    /// Guidance attached to every error carrying this code
    pub const fn default_suggestion(self) -> &'static str {
        match self {
            Self::InvalidInput => "Check the request parameters and try again",
            Self::Unauthorized => "Check credentials; the API key may be invalid or expired",
            Self::Forbidden => "The API key lacks permission for this operation",
            Self::ResourceNotFound => "Verify the resource identifier exists",
            Self::Conflict => "The resource was modified concurrently; refresh and retry",
            Self::RateLimitExceeded => "Wait and retry; the API rate limit was exceeded",
            Self::ApiError => "The remote API failed; retry later",
            Self::NetworkError => "Check network connectivity and the configured base URL",
            Self::AuthFailed => "Check credentials and the token endpoint configuration",
            Self::Cancelled => "The operation was cancelled by the caller",
            Self::Timeout => "The operation took too long; retry or increase the timeout",
            Self::ServiceUnavailable => "The service is temporarily unavailable; retry later",
            Self::Internal => "Unexpected internal failure; report this issue",
            Self::Config => "Fix the client configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of one logical call
///
/// Produced once per failed call and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct StructuredError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// HTTP status that produced this error, when there was a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Server-requested delay (`Retry-After`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
    /// Number of retries performed before this error surfaced
    #[serde(default)]
    pub retry_count: u32,
}

impl StructuredError {
    /// Create an error with the code's category and default suggestion
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            category: code.category(),
            message: message.into(),
            details: None,
            suggestion: Some(code.default_suggestion().to_string()),
            status: None,
            retry_after: None,
            retry_count: 0,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthFailed, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "operation cancelled")
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(ErrorCode::Timeout, format!("{operation} timed out after {after:?}"))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }
}

/// Classification interface used for retry and alerting decisions
pub trait ErrorClassification {
    /// Transient failures that may succeed if attempted again
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Data integrity or invariant violations
    fn is_critical(&self) -> bool;

    /// Suggested retry delay (e.g. from a `Retry-After` header)
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for StructuredError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::RateLimitExceeded
                | ErrorCode::ApiError
                | ErrorCode::NetworkError
                | ErrorCode::ServiceUnavailable
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self.code {
            ErrorCode::ResourceNotFound | ErrorCode::Cancelled => ErrorSeverity::Info,
            ErrorCode::RateLimitExceeded
            | ErrorCode::Conflict
            | ErrorCode::Timeout
            | ErrorCode::ServiceUnavailable => ErrorSeverity::Warning,
            ErrorCode::Internal => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        self.code == ErrorCode::Internal
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl From<serde_json::Error> for StructuredError {
    fn from(err: serde_json::Error) -> Self {
        Self::api(format!("invalid JSON payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_documented_categories() {
        assert_eq!(ErrorCode::InvalidInput.category(), ErrorCategory::Client);
        assert_eq!(ErrorCode::RateLimitExceeded.category(), ErrorCategory::Client);
        assert_eq!(ErrorCode::ApiError.category(), ErrorCategory::External);
        assert_eq!(ErrorCode::NetworkError.category(), ErrorCategory::External);
        assert_eq!(ErrorCode::AuthFailed.category(), ErrorCategory::External);
        assert_eq!(ErrorCode::Timeout.category(), ErrorCategory::Server);
    }

    #[test]
    fn every_error_carries_a_suggestion() {
        let err = StructuredError::not_found("alert 42");
        assert_eq!(err.category, ErrorCategory::Client);
        assert!(err.suggestion.is_some());
        assert_eq!(err.to_string(), "ResourceNotFound: alert 42");
    }

    #[test]
    fn builder_methods_attach_metadata() {
        let err = StructuredError::new(ErrorCode::RateLimitExceeded, "throttled")
            .with_status(429)
            .with_retry_after(Duration::from_secs(3))
            .with_retry_count(2);

        assert_eq!(err.status, Some(429));
        assert_eq!(ErrorClassification::retry_after(&err), Some(Duration::from_secs(3)));
        assert_eq!(err.retry_count, 2);
    }

    #[test]
    fn classification_flags() {
        assert!(StructuredError::network("reset").is_retryable());
        assert!(!StructuredError::invalid_input("bad").is_retryable());
        assert!(StructuredError::internal("bug").is_critical());
        assert_eq!(StructuredError::cancelled().severity(), ErrorSeverity::Info);
    }

    #[test]
    fn serializes_for_tool_relay() {
        let err = StructuredError::conflict("version mismatch").with_status(409);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "Conflict");
        assert_eq!(json["category"], "Client");
        assert_eq!(json["status"], 409);
        assert!(json.get("details").is_none());
    }
}
