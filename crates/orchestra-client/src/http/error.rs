/*
[INPUT]:  Error sources (HTTP, service responses, validation, push channel, serialization)
[OUTPUT]: Structured error types with operator messages and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the Orchestra client
#[derive(Error, Debug)]
pub enum OrchestraError {
    /// Request could not reach the queue service
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Queue service responded with a failure status
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Input rejected locally before any request was made
    #[error("{0}")]
    Validation(String),

    /// Push channel failed or closed
    #[error("Stream error: {0}")]
    Stream(String),

    /// Inbound push message could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The owning session was torn down before the call completed
    #[error("Session closed; result discarded")]
    SessionClosed,
}

impl OrchestraError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestraError::Network(_) | OrchestraError::Stream(_) => true,
            OrchestraError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text suitable for showing to an operator.
    pub fn operator_message(&self) -> String {
        match self {
            OrchestraError::Server { message, .. } => message.clone(),
            OrchestraError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Create a server error from status code and message
    pub fn server_error(status: StatusCode, message: impl Into<String>) -> Self {
        OrchestraError::Server {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for Orchestra operations
pub type Result<T> = std::result::Result<T, OrchestraError>;
