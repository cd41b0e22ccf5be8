/*
[INPUT]:  Push endpoint address derived from the page origin
[OUTPUT]: Real-time task updates and connection state
[POS]:    WebSocket layer - push channel
[UPDATE]: When adding envelope kinds or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{DEFAULT_STREAM_PATH, StreamState, TaskStream, stream_url};
pub use message::{StreamEvent, TASK_UPDATE_KIND, UpdateEnvelope};
