//! Instrumentation primitives
//!
//! - Sink traits the client reports into (traits/)
//! - In-memory sinks for snapshots and tests (metrics/)

pub mod metrics;
pub mod traits;

pub use metrics::{InMemoryAuditSink, InMemoryMetrics, MetricsSnapshot};
pub use traits::{AuditSink, MetricsSink, NoOpAudit, NoOpMetrics, ToolExecution};
