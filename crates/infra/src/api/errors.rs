//! Classification of HTTP and transport outcomes
//!
//! Pure decisional logic: nothing here performs I/O, so every mapping is
//! testable with literal inputs.

use logrelay_common::error::{ErrorCode, StructuredError};
use serde_json::Value;

use crate::http::{RawResponse, TransportError};

/// JSON fields a remote error body may carry its message in
const MESSAGE_FIELDS: [&str; 4] = ["message", "error", "detail", "error_description"];

/// Maps raw outcomes onto the [`StructuredError`] taxonomy
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Error code for a non-success HTTP status
    ///
    /// | Status | Code |
    /// |---|---|
    /// | 400 | `InvalidInput` |
    /// | 401 | `Unauthorized` |
    /// | 403 | `Forbidden` |
    /// | 404 | `ResourceNotFound` |
    /// | 409 | `Conflict` |
    /// | 429 | `RateLimitExceeded` |
    /// | 5xx | `ApiError` |
    ///
    /// Other 4xx statuses are the caller's fault and map to `InvalidInput`;
    /// anything else the remote side produced maps to `ApiError`.
    pub const fn code_for_status(status: u16) -> ErrorCode {
        match status {
            400 => ErrorCode::InvalidInput,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::ResourceNotFound,
            409 => ErrorCode::Conflict,
            429 => ErrorCode::RateLimitExceeded,
            402..=499 => ErrorCode::InvalidInput,
            _ => ErrorCode::ApiError,
        }
    }

    /// Classify a non-success status and its body
    ///
    /// A JSON body is attached as `details` and its message field, when
    /// present, becomes the error message.
    pub fn from_http_status(status: u16, body: &str) -> StructuredError {
        let code = Self::code_for_status(status);
        let parsed = serde_json::from_str::<Value>(body).ok();

        let message = parsed
            .as_ref()
            .and_then(remote_message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && parsed.is_none()).then(|| truncate(trimmed, 256))
            })
            .map_or_else(|| format!("HTTP {status}"), |msg| format!("HTTP {status}: {msg}"));

        let mut error = StructuredError::new(code, message).with_status(status);
        if let Some(details) = parsed.filter(|value| !value.is_null()) {
            error = error.with_details(details);
        }
        error
    }

    /// Classify a full response, carrying over its `Retry-After` hint
    pub fn from_response(response: &RawResponse) -> StructuredError {
        let error = Self::from_http_status(response.status, &response.body);
        match response.retry_after {
            Some(delay) => error.with_retry_after(delay),
            None => error,
        }
    }

    /// Failures before a status line are `NetworkError`, except a request
    /// that could not be built, which is `InvalidInput`
    pub fn from_transport(error: &TransportError) -> StructuredError {
        let suggestion = match error {
            TransportError::Build(_) => {
                return StructuredError::invalid_input(error.to_string())
                    .with_suggestion("check the request URL and headers");
            }
            TransportError::Timeout(_) => "the service was slow to respond; wait and retry",
            TransportError::Connect(_) => "check the base URL and network connectivity",
            TransportError::Request(_) | TransportError::Body(_) => {
                "check network connectivity and retry"
            }
        };
        StructuredError::network(error.to_string()).with_suggestion(suggestion)
    }
}

impl From<TransportError> for StructuredError {
    fn from(error: TransportError) -> Self {
        ErrorClassifier::from_transport(&error)
    }
}

fn remote_message(body: &Value) -> Option<String> {
    MESSAGE_FIELDS.iter().find_map(|field| match body.get(*field)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Object(nested) => nested.get("message")?.as_str().map(str::to_string),
        _ => None,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
