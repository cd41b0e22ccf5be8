/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Orchestra client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    DEFAULT_API_PATH,
    OrchestraClient,
    OrchestraError,
    Result,
    api_base_url,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    DEFAULT_STREAM_PATH,
    StreamEvent,
    StreamState,
    TaskStream,
    UpdateEnvelope,
    stream_url,
};
