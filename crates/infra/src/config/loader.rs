//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `LOGRELAY_BASE_URL` (required): API base URL
//! - `LOGRELAY_API_KEY` (required): API key
//! - `LOGRELAY_TOKEN_URL`: token endpoint exchanging the key for a bearer
//! - `LOGRELAY_TIMEOUT_SECS`: per-request timeout
//! - `LOGRELAY_MAX_RETRIES`: total attempts per call
//! - `LOGRELAY_MIN_BACKOFF_MS` / `LOGRELAY_MAX_BACKOFF_MS`: backoff bounds
//! - `LOGRELAY_RATE_LIMIT`: requests per second
//! - `LOGRELAY_BURST`: burst capacity
//! - `LOGRELAY_VERIFY_TLS`: TLS verification (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./logrelay.{json,toml}` or `./config.{json,toml}` (current working
//!    directory)
//! 2. Parent directories (up to 2 levels)
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use logrelay_common::error::StructuredError;
use logrelay_domain::ClientConfig;

const FILE_NAMES: [&str; 4] = ["logrelay.json", "logrelay.toml", "config.json", "config.toml"];
const SEARCH_DIRS: [&str; 3] = [".", "..", "../.."];

type Result<T> = std::result::Result<T, StructuredError>;

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ErrorCode::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `LOGRELAY_BASE_URL` and `LOGRELAY_API_KEY` are required; every other
/// variable falls back to its default.
///
/// # Errors
/// Returns `ErrorCode::Config` if required variables are missing, values do
/// not parse, or validation fails.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("LOGRELAY_BASE_URL")?, env_var("LOGRELAY_API_KEY")?);

    config.token_url = std::env::var("LOGRELAY_TOKEN_URL").ok().filter(|url| !url.trim().is_empty());
    if let Some(timeout) = env_parse("LOGRELAY_TIMEOUT_SECS")? {
        config.timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse("LOGRELAY_MAX_RETRIES")? {
        config.max_retries = attempts;
    }
    if let Some(min) = env_parse("LOGRELAY_MIN_BACKOFF_MS")? {
        config.min_backoff_ms = min;
    }
    if let Some(max) = env_parse("LOGRELAY_MAX_BACKOFF_MS")? {
        config.max_backoff_ms = max;
    }
    if let Some(rate) = env_parse("LOGRELAY_RATE_LIMIT")? {
        config.rate_limit_per_second = rate;
    }
    if let Some(burst) = env_parse("LOGRELAY_BURST")? {
        config.burst_capacity = burst;
    }
    config.verify_tls = env_bool("LOGRELAY_VERIFY_TLS", config.verify_tls);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ErrorCode::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StructuredError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StructuredError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StructuredError::config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StructuredError::config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StructuredError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(StructuredError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the working directory, its parents, or
/// next to the executable
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| {
            SEARCH_DIRS.iter().flat_map(move |dir| FILE_NAMES.iter().map(move |name| root.join(dir).join(name)))
        })
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| StructuredError::config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional variable; unset yields `None`
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| StructuredError::config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Anything else, or an unset variable, yields `default`.
fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|s| s.trim().to_ascii_lowercase()) {
        Ok(value) if matches!(value.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(value) if matches!(value.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use logrelay_common::error::ErrorCode;
    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 10] = [
        "LOGRELAY_BASE_URL",
        "LOGRELAY_API_KEY",
        "LOGRELAY_TOKEN_URL",
        "LOGRELAY_TIMEOUT_SECS",
        "LOGRELAY_MAX_RETRIES",
        "LOGRELAY_MIN_BACKOFF_MS",
        "LOGRELAY_MAX_BACKOFF_MS",
        "LOGRELAY_RATE_LIMIT",
        "LOGRELAY_BURST",
        "LOGRELAY_VERIFY_TLS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (value, expected) in [("1", true), ("TRUE", true), ("yes", true), ("on", true)] {
            std::env::set_var("LOGRELAY_TEST_BOOL", value);
            assert_eq!(env_bool("LOGRELAY_TEST_BOOL", !expected), expected, "{value}");
        }
        for (value, expected) in [("0", false), ("false", false), ("No", false), ("off", false)] {
            std::env::set_var("LOGRELAY_TEST_BOOL", value);
            assert_eq!(env_bool("LOGRELAY_TEST_BOOL", !expected), expected, "{value}");
        }

        std::env::set_var("LOGRELAY_TEST_BOOL", "maybe");
        assert!(env_bool("LOGRELAY_TEST_BOOL", true));

        std::env::remove_var("LOGRELAY_TEST_BOOL");
        assert!(env_bool("LOGRELAY_TEST_BOOL", true));
        assert!(!env_bool("LOGRELAY_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("LOGRELAY_BASE_URL", "https://api.eu2.logrelay.test/");
        std::env::set_var("LOGRELAY_API_KEY", "cxtp_key");
        std::env::set_var("LOGRELAY_TOKEN_URL", "https://auth.logrelay.test/token");
        std::env::set_var("LOGRELAY_TIMEOUT_SECS", "15");
        std::env::set_var("LOGRELAY_MAX_RETRIES", "5");
        std::env::set_var("LOGRELAY_MIN_BACKOFF_MS", "200");
        std::env::set_var("LOGRELAY_MAX_BACKOFF_MS", "4000");
        std::env::set_var("LOGRELAY_RATE_LIMIT", "2.5");
        std::env::set_var("LOGRELAY_BURST", "4");
        std::env::set_var("LOGRELAY_VERIFY_TLS", "off");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "https://api.eu2.logrelay.test/");
        assert_eq!(config.normalized_base_url(), "https://api.eu2.logrelay.test");
        assert_eq!(config.token_url.as_deref(), Some("https://auth.logrelay.test/token"));
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.min_backoff_ms, 200);
        assert_eq!(config.max_backoff_ms, 4000);
        assert!((config.rate_limit_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.burst_capacity, 4);
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_load_from_env_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("LOGRELAY_BASE_URL", "https://api.logrelay.test");
        std::env::set_var("LOGRELAY_API_KEY", "key");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.burst_capacity, 20);
        assert!(config.verify_tls);
        assert!(config.token_url.is_none());
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("LOGRELAY_BASE_URL", "https://api.logrelay.test");

        let result = load_from_env();
        clear_env();

        let err = result.expect_err("missing api key");
        assert_eq!(err.code, ErrorCode::Config);
        assert!(err.message.contains("LOGRELAY_API_KEY"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("LOGRELAY_BASE_URL", "https://api.logrelay.test");
        std::env::set_var("LOGRELAY_API_KEY", "key");
        std::env::set_var("LOGRELAY_BURST", "lots");

        let result = load_from_env();
        clear_env();

        let err = result.expect_err("invalid burst");
        assert_eq!(err.code, ErrorCode::Config);
        assert!(err.message.contains("LOGRELAY_BURST"));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_config() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("LOGRELAY_BASE_URL", "https://api.logrelay.test");
        std::env::set_var("LOGRELAY_API_KEY", "key");
        std::env::set_var("LOGRELAY_MIN_BACKOFF_MS", "5000");
        std::env::set_var("LOGRELAY_MAX_BACKOFF_MS", "100");

        let result = load_from_env();
        clear_env();

        assert_eq!(result.expect_err("backoff bounds").code, ErrorCode::Config);
    }

    #[test]
    fn test_load_from_file_json() {
        let path = temp_config(
            r#"{
                "base_url": "https://api.logrelay.test",
                "api_key": "key",
                "max_retries": 4,
                "background_poll_interval_ms": 500
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).expect("JSON config");
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.background_poll_interval_ms, 500);
        assert_eq!(config.timeout_secs, 30);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = temp_config(
            r#"
base_url = "https://api.logrelay.test"
api_key = "key"
rate_limit_per_second = 5.0
burst_capacity = 2
verify_tls = false
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).expect("TOML config");
        assert_eq!(config.burst_capacity, 2);
        assert!(!config.verify_tls);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_validates() {
        let path = temp_config(r#"{ "base_url": "https://api.logrelay.test", "api_key": "" }"#, "json");

        let err = load_from_file(Some(path.clone())).expect_err("empty api key");
        assert_eq!(err.code, ErrorCode::Config);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/logrelay.json"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Config);
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = temp_config(r#"{ "this is": "not valid json" "#, "json");
        assert!(load_from_file(Some(path.clone())).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
