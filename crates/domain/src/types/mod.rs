//! Domain types and models

pub mod background;
pub mod request;

pub use background::{BackgroundQuery, BackgroundQuerySpec, QueryStatus, TransitionError};
pub use request::{ApiRequest, ApiResponse, HttpMethod};
