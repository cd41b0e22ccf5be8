/*
[INPUT]:  Task view snapshots, session state
[OUTPUT]: Plain-text lines for the terminal watcher
[POS]:    Presentation layer - CLI rendering only
[UPDATE]: When changing columns or status formatting
*/

use std::fmt::Write as _;

use orchestra_client::Task;

use crate::reconciler::TaskCollection;
use crate::session::{ConnectionState, SnapshotState};

const PAYLOAD_PREVIEW_CHARS: usize = 40;

pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "#{:<6} {:<9} {:<6} {:<9} retries={} created={}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.task_type.as_str(),
        task.retry_count,
        task.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    if let Some(finished_at) = task.finished_at {
        let _ = write!(line, " finished={}", finished_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(payload) = task.payload.as_deref() {
        let _ = write!(line, " payload={}", preview(payload));
    }
    if let Some(error) = task.error_message.as_deref() {
        let _ = write!(line, " error={error:?}");
    }
    if task.is_retryable() {
        line.push_str(" [retryable]");
    }
    line
}

/// Header plus one line per task, id descending.
pub fn view_table(collection: &TaskCollection) -> String {
    let mut out = format!("{} task(s)\n", collection.len());
    for task in collection {
        out.push_str(&task_line(task));
        out.push('\n');
    }
    out
}

pub fn connection_label(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Connecting => "connecting".to_string(),
        ConnectionState::Open => "live".to_string(),
        ConnectionState::Reconnecting { retry_count } => format!("reconnecting (attempt {retry_count})"),
        ConnectionState::Closed => "closed".to_string(),
    }
}

pub fn snapshot_label(state: &SnapshotState) -> String {
    match state {
        SnapshotState::Pending => "loading tasks".to_string(),
        SnapshotState::Loaded { count } => format!("loaded {count} task(s)"),
        SnapshotState::Failed { message } => format!("Error: {message}"),
    }
}

fn preview(payload: &str) -> String {
    if payload.chars().count() <= PAYLOAD_PREVIEW_CHARS {
        return payload.to_string();
    }
    let mut out: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}
