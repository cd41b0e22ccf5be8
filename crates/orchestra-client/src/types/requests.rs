/*
[INPUT]:  Operator input for task submission and snapshot paging
[OUTPUT]: Validated request structs ready for serialization
[POS]:    Data layer - request types and local validation
[UPDATE]: When the create-task schema or snapshot query parameters change
*/

use serde::{Deserialize, Serialize};

use super::enums::{Priority, TaskType};
use crate::http::{OrchestraError, Result};

/// Payload prefilled for new drafts.
pub const DEFAULT_PAYLOAD: &str = r#"{"message": "hello world"}"#;

/// Task submission as typed by an operator, before validation.
///
/// `delay` is kept as raw text so that anything an operator can type is
/// accepted and normalized instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub task_type: TaskType,
    pub payload: String,
    pub priority: Priority,
    pub delay: String,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            task_type: TaskType::default(),
            payload: DEFAULT_PAYLOAD.to_string(),
            priority: Priority::default(),
            delay: "0".to_string(),
        }
    }
}

impl TaskDraft {
    /// Check the payload syntax and normalize the delay.
    ///
    /// Fails with `OrchestraError::Validation` when the payload is not
    /// well-formed JSON; nothing is sent in that case.
    pub fn into_request(self) -> Result<NewTaskRequest> {
        validate_payload(&self.payload)?;
        Ok(NewTaskRequest {
            task_type: self.task_type,
            delay: normalize_delay(&self.delay),
            payload: self.payload,
            priority: self.priority,
        })
    }
}

/// Body of `POST tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub task_type: TaskType,
    pub payload: String,
    pub priority: Priority,
    pub delay: u64,
}

/// Optional paging for `GET tasks`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl TaskQuery {
    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.limit.is_none()
    }
}

/// Syntax-only check: the payload must parse as JSON. Its contents are never
/// inspected.
pub fn validate_payload(payload: &str) -> Result<()> {
    serde_json::from_str::<serde::de::IgnoredAny>(payload)
        .map(|_| ())
        .map_err(|_| OrchestraError::Validation("Payload must be valid JSON.".to_string()))
}

/// Coerce operator delay input to whole non-negative seconds.
///
/// The leading integer is used (`"12s"` is 12, `"3.7"` is 3). Negative or
/// non-numeric input becomes 0.
pub fn normalize_delay(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return 0;
    }

    digits[..end].parse::<u64>().unwrap_or(u64::MAX)
}
