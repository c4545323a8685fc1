//! # LogRelay Domain
//!
//! Pure data types for the LogRelay client layer.
//!
//! This crate contains:
//! - Client configuration and its validation
//! - Request/response values passed through the client
//! - Background query records and their status state machine
//! - Shared defaults and endpoint constants
//!
//! ## Architecture
//! - Depends only on the foundation tier of `logrelay-common`
//! - No I/O, no async runtime

pub mod config;
pub mod constants;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::ClientConfig;
pub use types::*;
