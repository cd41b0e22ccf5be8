/*
[INPUT]:  Raw push channel message text
[OUTPUT]: Decoded UpdateEnvelope and typed StreamEvent
[POS]:    WebSocket layer - message schema and validation
[UPDATE]: When adding new envelope kinds or changing format
*/

use serde::{Deserialize, Serialize};

use crate::http::{OrchestraError, Result};
use crate::types::Task;

/// The only envelope kind that carries meaning today.
pub const TASK_UPDATE_KIND: &str = "task_update";

/// Push channel framing: one envelope per message.
///
/// The service's publisher names the discriminator `event`; both spellings
/// are accepted. `data` is only required for `task_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    #[serde(alias = "event")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Decoded push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full, authoritative current state of one task.
    TaskUpdate(Task),
    /// Envelope of a kind this client does not know; carries no state.
    Ignored { kind: String },
}

impl UpdateEnvelope {
    /// Envelope announcing the current state of a task.
    pub fn task_update(task: &Task) -> Result<Self> {
        Ok(Self {
            kind: TASK_UPDATE_KIND.to_string(),
            data: Some(serde_json::to_value(task)?),
        })
    }

    /// Parse one message. Anything that is not a well-formed envelope is a
    /// protocol error.
    pub fn decode(raw: &str) -> Result<StreamEvent> {
        let envelope: UpdateEnvelope = serde_json::from_str(raw)
            .map_err(|err| OrchestraError::Protocol(format!("invalid envelope: {err}")))?;
        envelope.into_event()
    }

    pub fn into_event(self) -> Result<StreamEvent> {
        if self.kind != TASK_UPDATE_KIND {
            return Ok(StreamEvent::Ignored { kind: self.kind });
        }

        let data = self.data.ok_or_else(|| {
            OrchestraError::Protocol("task_update envelope without data".to_string())
        })?;
        let task: Task = serde_json::from_value(data)
            .map_err(|err| OrchestraError::Protocol(format!("invalid task_update data: {err}")))?;
        Ok(StreamEvent::TaskUpdate(task))
    }
}
