//! Client constants
//!
//! Centralized defaults and remote endpoint paths used across the client
//! layer.

// Configuration defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MIN_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_RATE_LIMIT_PER_SECOND: f64 = 10.0;
pub const DEFAULT_BURST_CAPACITY: u32 = 20;
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_STATIC_TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_USER_AGENT: &str = concat!("logrelay/", env!("CARGO_PKG_VERSION"));

// Background queries
pub const DEFAULT_BACKGROUND_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_BACKGROUND_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_BACKGROUND_TTL_SECS: u64 = 3_600;
pub const DEFAULT_FETCH_LIMIT: u32 = 1_000;
pub const BACKGROUND_QUERY_BASE_PATH: &str = "/api/v1/dataprime/background-query";

// Misc endpoints
pub const HEALTH_PATH: &str = "/health";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
