/*
[INPUT]:  Operator commands (task drafts, retry requests)
[OUTPUT]: Service acknowledgements and operator notices; never touches the view
[POS]:    Command layer - create/retry dispatch
[UPDATE]: When adding commands or changing operator feedback
*/

use std::fmt;

use orchestra_client::{OrchestraClient, OrchestraError, Result, Task, TaskDraft};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sends operator commands to the queue service.
///
/// State changes caused by a command arrive later over the push channel;
/// nothing here writes to the task view. Commands issued after the owning
/// session was torn down are not sent, and results that land after teardown
/// are discarded. Both report `SessionClosed`.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    client: OrchestraClient,
    session: CancellationToken,
}

impl ActionDispatcher {
    pub fn new(client: OrchestraClient, session: CancellationToken) -> Self {
        Self { client, session }
    }

    /// Validate and submit a task. Invalid payloads are rejected locally
    /// without a request.
    pub async fn create_task(&self, draft: TaskDraft, idempotency_key: Option<&str>) -> Result<Task> {
        let request = draft.into_request()?;
        self.ensure_open("create_task")?;
        let result = self.client.create_task(&request, idempotency_key).await;
        self.settle("create_task", result)
    }

    pub async fn retry_task(&self, task_id: i64) -> Result<()> {
        self.ensure_open("retry_task")?;
        let result = self.client.retry_task(task_id).await;
        self.settle("retry_task", result)
    }

    fn ensure_open(&self, action: &'static str) -> Result<()> {
        if self.session.is_cancelled() {
            debug!(action, "session closed; not sending");
            return Err(OrchestraError::SessionClosed);
        }
        Ok(())
    }

    fn settle<T>(&self, action: &'static str, result: Result<T>) -> Result<T> {
        if self.session.is_cancelled() {
            debug!(action, "session closed; discarding dispatch result");
            return Err(OrchestraError::SessionClosed);
        }
        if let Err(err) = &result {
            warn!(action, error = %err, "dispatch failed");
        }
        result
    }
}

/// Non-blocking feedback for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn for_create(result: &Result<Task>) -> Option<Self> {
        match result {
            Ok(_) => Some(Notice::Info("Task created successfully!".to_string())),
            Err(OrchestraError::SessionClosed) => None,
            Err(err) => Some(Notice::Error(err.operator_message())),
        }
    }

    pub fn for_retry(task_id: i64, result: &Result<()>) -> Option<Self> {
        match result {
            Ok(()) => Some(Notice::Info(format!("Retry requested for task {task_id}."))),
            Err(OrchestraError::SessionClosed) => None,
            Err(err) => Some(Notice::Error(err.operator_message())),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(message) => f.write_str(message),
            Notice::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orchestra_client::{Priority, TaskType};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn created_task(id: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id, "task_type": "io_bound", "status": "pending", "priority": "medium",
            "payload": "{}", "retry_count": 0, "created_at": "2024-01-01T00:00:00"
        })
    }

    async fn wait_for_request(server: &MockServer) {
        for _ in 0..100 {
            if server
                .received_requests()
                .await
                .is_some_and(|requests| !requests.is_empty())
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("request never reached the server");
    }

    fn dispatcher_for(server: &MockServer, session: CancellationToken) -> ActionDispatcher {
        let client = OrchestraClient::new(&format!("{}/api/v1/", server.uri())).unwrap();
        ActionDispatcher::new(client, session)
    }

    #[tokio::test]
    async fn test_invalid_payload_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_json(created_task(1)))
            .expect(0)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, CancellationToken::new());
        let draft = TaskDraft {
            payload: "{bad".to_string(),
            ..TaskDraft::default()
        };

        let result = dispatcher.create_task(draft, None).await;
        assert!(matches!(result, Err(OrchestraError::Validation(_))));
        assert_eq!(
            Notice::for_create(&result),
            Some(Notice::Error("Payload must be valid JSON.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_negative_delay_sent_as_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tasks"))
            .and(body_partial_json(serde_json::json!({"delay": 0, "priority": "low"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(created_task(4)))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, CancellationToken::new());
        let draft = TaskDraft {
            task_type: TaskType::IoBound,
            payload: "{}".to_string(),
            priority: Priority::Low,
            delay: "-5".to_string(),
        };

        let result = dispatcher.create_task(draft, None).await;
        assert_eq!(result.as_ref().map(|task| task.id).ok(), Some(4));
        assert_eq!(
            Notice::for_create(&result),
            Some(Notice::Info("Task created successfully!".to_string()))
        );
    }

    #[tokio::test]
    async fn test_command_after_teardown_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_json(created_task(1)))
            .expect(0)
            .mount(&server)
            .await;

        let session = CancellationToken::new();
        let dispatcher = dispatcher_for(&server, session.clone());
        session.cancel();

        let retried = dispatcher.retry_task(3).await;
        assert!(matches!(retried, Err(OrchestraError::SessionClosed)));
        assert_eq!(Notice::for_retry(3, &retried), None);

        let created = dispatcher.create_task(TaskDraft::default(), None).await;
        assert!(matches!(created, Err(OrchestraError::SessionClosed)));
        assert_eq!(Notice::for_create(&created), None);
    }

    #[tokio::test]
    async fn test_result_landing_after_teardown_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tasks/3/retry"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let session = CancellationToken::new();
        let dispatcher = dispatcher_for(&server, session.clone());
        let in_flight = tokio::spawn(async move { dispatcher.retry_task(3).await });

        wait_for_request(&server).await;
        session.cancel();

        let result = in_flight.await.expect("dispatch task");
        assert!(matches!(result, Err(OrchestraError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_retry_failure_becomes_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tasks/7/retry"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, CancellationToken::new());
        let result = dispatcher.retry_task(7).await;

        let notice = Notice::for_retry(7, &result).expect("notice");
        assert!(notice.is_error());
        assert_eq!(notice.to_string(), "Error: Failed to retry task 7.");
    }
}
