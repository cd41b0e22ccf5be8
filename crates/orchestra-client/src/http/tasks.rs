/*
[INPUT]:  Snapshot paging, validated task submissions, task ids
[OUTPUT]: Task lists, acknowledged tasks, retry confirmation
[POS]:    HTTP layer - task endpoints (snapshot + operator commands)
[UPDATE]: When adding task endpoints or changing request/response format
*/

use reqwest::Method;
use tracing::{debug, info};

use crate::http::{OrchestraClient, Result};
use crate::types::{NewTaskRequest, Task, TaskQuery};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

impl OrchestraClient {
    /// List tasks
    ///
    /// GET tasks?skip={skip}&limit={limit}
    ///
    /// The list is returned as the service sent it; callers impose order.
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut builder = self.request(Method::GET, "tasks")?;
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let tasks: Vec<Task> = self.send_json(builder, "Failed to fetch tasks.").await?;
        debug!(count = tasks.len(), "task list fetched");
        Ok(tasks)
    }

    /// Submit a new task
    ///
    /// POST tasks
    pub async fn create_task(
        &self,
        request: &NewTaskRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Task> {
        let mut builder = self.request(Method::POST, "tasks")?.json(request);
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }
        let task: Task = self.send_json(builder, "Failed to create task.").await?;
        info!(
            task_id = task.id,
            task_type = %request.task_type,
            priority = %request.priority,
            delay = request.delay,
            "task accepted"
        );
        Ok(task)
    }

    /// Ask the service to run a task again
    ///
    /// POST tasks/{id}/retry
    pub async fn retry_task(&self, task_id: i64) -> Result<()> {
        let endpoint = format!("tasks/{}/retry", task_id);
        let builder = self.request(Method::POST, &endpoint)?;
        let fallback = format!("Failed to retry task {}.", task_id);
        self.send_unit(builder, &fallback).await?;
        info!(task_id, "task retry requested");
        Ok(())
    }
}
