//! HTTP transport boundary

pub mod client;

pub use client::{
    parse_retry_after, HttpClient, HttpClientBuilder, HttpTransport, RawResponse,
    TransportError, TransportRequest,
};
