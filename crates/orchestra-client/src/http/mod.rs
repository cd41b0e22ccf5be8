/*
[INPUT]:  HTTP client configuration and queue service endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod tasks;

pub use error::{OrchestraError, Result};

pub use client::{ClientConfig, DEFAULT_API_PATH, OrchestraClient, api_base_url};
