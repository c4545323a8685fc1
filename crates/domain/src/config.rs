//! Client configuration
//!
//! Consumed once at construction; nothing downstream re-validates it per
//! call. Missing fields fall back to [`ClientConfig::default`] when
//! deserialized.

use std::time::Duration;

use logrelay_common::error::StructuredError;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKGROUND_POLL_INTERVAL_MS, DEFAULT_BACKGROUND_TIMEOUT_SECS,
    DEFAULT_BACKGROUND_TTL_SECS, DEFAULT_BURST_CAPACITY, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_BACKOFF_MS, DEFAULT_RATE_LIMIT_PER_SECOND,
    DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_REFRESH_MARGIN_SECS, DEFAULT_USER_AGENT,
};

/// Everything needed to build a client against one remote API
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `https://api.example.com`
    pub base_url: String,
    /// API key; the secret credential
    pub api_key: String,
    /// Token exchange endpoint; when absent the API key is the bearer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts per logical call, including the first
    pub max_retries: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub rate_limit_per_second: f64,
    pub burst_capacity: u32,
    pub verify_tls: bool,
    pub token_refresh_margin_secs: u64,
    pub background_poll_interval_ms: u64,
    pub background_timeout_secs: u64,
    pub background_ttl_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            token_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff_ms: DEFAULT_MIN_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
            burst_capacity: DEFAULT_BURST_CAPACITY,
            verify_tls: true,
            token_refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
            background_poll_interval_ms: DEFAULT_BACKGROUND_POLL_INTERVAL_MS,
            background_timeout_secs: DEFAULT_BACKGROUND_TIMEOUT_SECS,
            background_ttl_secs: DEFAULT_BACKGROUND_TTL_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// api_key is a secret
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("min_backoff_ms", &self.min_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("burst_capacity", &self.burst_capacity)
            .field("verify_tls", &self.verify_tls)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into(), ..Self::default() }
    }

    /// Reject configurations the client cannot run with
    ///
    /// # Errors
    ///
    /// `ErrorCode::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), StructuredError> {
        if self.base_url.trim().is_empty() {
            return Err(StructuredError::config("base_url must not be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(StructuredError::config(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(StructuredError::config("api_key must not be empty"));
        }
        if self.token_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(StructuredError::config("token_url must not be empty when set"));
        }
        if self.timeout_secs == 0 {
            return Err(StructuredError::config("timeout_secs must be greater than 0"));
        }
        if self.max_retries == 0 {
            return Err(StructuredError::config("max_retries must be at least 1"));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(StructuredError::config(format!(
                "min_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                self.min_backoff_ms, self.max_backoff_ms
            )));
        }
        if !self.rate_limit_per_second.is_finite() || self.rate_limit_per_second <= 0.0 {
            return Err(StructuredError::config("rate_limit_per_second must be positive"));
        }
        if self.burst_capacity == 0 {
            return Err(StructuredError::config("burst_capacity must be greater than 0"));
        }
        if self.background_poll_interval_ms == 0 {
            return Err(StructuredError::config(
                "background_poll_interval_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// `base_url` without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }

    pub fn background_poll_interval(&self) -> Duration {
        Duration::from_millis(self.background_poll_interval_ms)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_secs(self.background_timeout_secs)
    }

    pub fn background_ttl(&self) -> Duration {
        Duration::from_secs(self.background_ttl_secs)
    }
}
