/*
[INPUT]:  Configured client + optional snapshot paging
[OUTPUT]: Full task list for session start (verbatim wire order)
[POS]:    Data layer - one-shot snapshot load
[UPDATE]: When snapshot paging or failure handling changes
*/

use orchestra_client::{OrchestraClient, Result, Task, TaskQuery};
use tracing::{info, warn};

/// Loads the full task list once per session (and once per resync).
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    client: OrchestraClient,
    query: TaskQuery,
}

impl SnapshotLoader {
    pub fn new(client: OrchestraClient, query: TaskQuery) -> Self {
        Self { client, query }
    }

    /// One request. No retry; failures are logged and returned.
    pub async fn fetch_all(&self) -> Result<Vec<Task>> {
        match self.client.list_tasks(&self.query).await {
            Ok(tasks) => {
                info!(count = tasks.len(), "task snapshot loaded");
                Ok(tasks)
            }
            Err(err) => {
                warn!(error = %err, "task snapshot failed");
                Err(err)
            }
        }
    }
}
