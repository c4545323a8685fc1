//! Remote API client
//!
//! - [`Authenticator`]: credential ownership and single-flight token refresh
//! - [`ErrorClassifier`]: HTTP/transport outcome to [`StructuredError`]
//!   mapping
//! - [`ApiClient`]: rate limit, authenticate, then retry around the transport
//! - [`BackgroundQueryManager`]: long-running query lifecycle on top of the
//!   client
//!
//! [`StructuredError`]: logrelay_common::error::StructuredError

pub mod auth;
pub mod background;
pub mod client;
pub mod context;
pub mod errors;

pub use auth::{
    decode_jwt_claims, Authenticator, Credential, HttpTokenSource, StaticTokenSource, Token,
    TokenSource,
};
pub use background::{BackgroundQueryManager, BackgroundQueryPaths};
pub use client::{ApiClient, ApiClientBuilder};
pub use context::CallContext;
pub use errors::ErrorClassifier;
