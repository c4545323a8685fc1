//! In-memory instrumentation sinks
//!
//! [`InMemoryMetrics`] keeps atomic counters plus a bounded window of recent
//! latencies for percentile queries. [`InMemoryAuditSink`] collects audit
//! records. Both are cheap to clone-share behind an `Arc` and are the sinks
//! used in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::traits::{AuditSink, MetricsSink, ToolExecution};

/// Default number of latency samples kept for percentiles
pub const DEFAULT_LATENCY_WINDOW: usize = 1024;

/// Point-in-time copy of [`InMemoryMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub rate_limit_hits: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p50_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<u64>,
}

impl MetricsSnapshot {
    /// Share of successful requests (0.0-100.0)
    pub fn success_rate_percent(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        (self.successes as f64 / self.requests as f64) * 100.0
    }
}

/// Thread-safe in-memory metrics sink
#[derive(Debug)]
pub struct InMemoryMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    rate_limit_hits: AtomicU64,
    last_status: Mutex<Option<u16>>,
    latencies: Mutex<VecDeque<Duration>>,
    window: usize,
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }

    /// Keep at most `window` latency samples (minimum 1)
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rate_limit_hits: AtomicU64::new(0),
            last_status: Mutex::new(None),
            latencies: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    /// Latency at percentile `p` (0.0-1.0) over the retained window
    pub fn latency_percentile(&self, p: f64) -> Option<Duration> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        let mut samples: Vec<Duration> = self.latencies.lock().iter().copied().collect();
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let rank = ((samples.len() as f64 - 1.0) * p).ceil() as usize;
        samples.get(rank.min(samples.len() - 1)).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let as_ms = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            last_status: *self.last_status.lock(),
            p50_ms: self.latency_percentile(0.50).map(as_ms),
            p95_ms: self.latency_percentile(0.95).map(as_ms),
        }
    }

    pub fn reset(&self) {
        for counter in
            [&self.requests, &self.successes, &self.failures, &self.retries, &self.rate_limit_hits]
        {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_status.lock() = None;
        self.latencies.lock().clear();
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_request(&self, success: bool, latency: Duration, status_code: Option<u16>) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_status.lock() = status_code;

        let mut latencies = self.latencies.lock();
        if latencies.len() == self.window {
            latencies.pop_front();
        }
        latencies.push_back(latency);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Audit sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<ToolExecution>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ToolExecution> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn log_tool_execution(&self, execution: ToolExecution) {
        self.records.lock().push(execution);
    }
}
