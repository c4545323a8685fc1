//! Observability wiring: subscriber setup and sink implementations
//!
//! - [`init_tracing`] installs the global `tracing` subscriber
//! - [`FacadeMetrics`] forwards client metrics to the `metrics` facade, so
//!   any installed recorder (Prometheus, StatsD, ...) picks them up
//! - [`TracingAuditSink`] writes audit records as events on target `audit`

use std::str::FromStr;
use std::time::Duration;

use logrelay_common::error::StructuredError;
use logrelay_common::observability::{AuditSink, MetricsSink, ToolExecution};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const REQUESTS_TOTAL: &str = "logrelay_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "logrelay_request_duration_seconds";
pub const RETRIES_TOTAL: &str = "logrelay_retries_total";
pub const RATE_LIMIT_HITS_TOTAL: &str = "logrelay_rate_limit_hits_total";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = StructuredError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(StructuredError::config(format!("unknown log format: {other}"))),
        }
    }
}

/// Install the global subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Returns `false` when a
/// subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if installed {
        info!(?format, "tracing initialized");
    }
    installed
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Logical API calls by outcome and status");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "End-to-end latency of logical API calls"
    );
    describe_counter!(RETRIES_TOTAL, "Retried attempts, including credential-refresh replays");
    describe_counter!(RATE_LIMIT_HITS_TOTAL, "Calls that waited for rate limiter capacity");
}

/// [`MetricsSink`] backed by the `metrics` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn record_request(&self, success: bool, latency: Duration, status_code: Option<u16>) {
        let outcome = if success { "success" } else { "failure" };
        let status = status_code.map_or_else(|| "none".to_string(), |code| code.to_string());
        counter!(REQUESTS_TOTAL, "outcome" => outcome, "status" => status).increment(1);
        histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome).record(latency.as_secs_f64());
    }

    fn record_retry(&self) {
        counter!(RETRIES_TOTAL).increment(1);
    }

    fn record_rate_limit_hit(&self) {
        counter!(RATE_LIMIT_HITS_TOTAL).increment(1);
    }
}

/// [`AuditSink`] emitting one `tracing` event per tool execution
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_tool_execution(&self, execution: ToolExecution) {
        let duration_ms = u64::try_from(execution.duration.as_millis()).unwrap_or(u64::MAX);
        if execution.success {
            info!(
                target: "audit",
                tool = %execution.name,
                operation = %execution.operation,
                resource = execution.resource.as_deref(),
                success = true,
                duration_ms,
                "tool execution"
            );
        } else {
            warn!(
                target: "audit",
                tool = %execution.name,
                operation = %execution.operation,
                resource = execution.resource.as_deref(),
                success = false,
                duration_ms,
                error = execution.error.as_deref(),
                "tool execution"
            );
        }
    }
}
