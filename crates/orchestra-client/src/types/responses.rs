/*
[INPUT]:  Error bodies returned by the queue service
[OUTPUT]: Typed error body with most-specific message extraction
[POS]:    Data layer - response types
[UPDATE]: When the service changes its error body shape
*/

use serde::{Deserialize, Serialize};

/// Failure body: `{"detail": [{"msg": ...}, ...]}` for field validation
/// errors, `{"detail": "..."}` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Fields(Vec<FieldError>),
    Message(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ErrorBody {
    /// First field-level message, else the detail string.
    pub fn message(&self) -> Option<&str> {
        match self.detail.as_ref()? {
            ErrorDetail::Fields(fields) => fields
                .first()
                .and_then(|field| field.msg.as_deref())
                .filter(|msg| !msg.is_empty()),
            ErrorDetail::Message(message) if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Pick the most specific message out of a raw error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message().map(str::to_string))
}
