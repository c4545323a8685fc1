//! # LogRelay Infrastructure
//!
//! Impure half of the LogRelay client layer.
//!
//! This crate contains:
//! - Configuration loading (environment and TOML/JSON files)
//! - The reqwest-backed HTTP transport
//! - Authentication, error classification and the request executor
//! - Background query management
//! - The tool registry
//! - Tracing setup plus metrics and audit sinks
//!
//! ## Architecture
//! - Builds on the resilience primitives of `logrelay-common`
//! - Uses the data types of `logrelay-domain`
//! - Contains all code that performs I/O

pub mod api;
pub mod config;
pub mod http;
pub mod observability;
pub mod tools;

// Re-export commonly used items
pub use api::{ApiClient, BackgroundQueryManager, CallContext};
pub use http::{HttpClient, HttpTransport};
pub use observability::{init_tracing, LogFormat};
pub use tools::{Tool, ToolRegistry};
