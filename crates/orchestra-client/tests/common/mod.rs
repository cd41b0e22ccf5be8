/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for orchestra-client tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Task record in the shape the queue service emits
pub fn task_json(id: i64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "idempotency_key": null,
        "task_type": "io_bound",
        "status": status,
        "priority": "medium",
        "payload": "{\"message\": \"hello world\"}",
        "retry_count": 0,
        "created_at": "2024-01-01T00:00:00",
        "finished_at": null,
        "error_message": null
    })
}

/// `task_update` envelope text for a task record
pub fn task_update_text(id: i64, status: &str) -> WsMessage {
    let envelope = serde_json::json!({
        "event": "task_update",
        "data": task_json(id, status),
    });
    WsMessage::Text(envelope.to_string().into())
}

/// Single-connection push server driven by the test
pub struct ScriptedWsServer {
    /// `http://` origin of the server; derive the stream URL from it
    pub origin: Url,
    /// Frames to push to the connected client; dropping it closes the socket
    pub outbound: mpsc::UnboundedSender<WsMessage>,
    /// Fires once the client has closed (or dropped) the connection
    pub client_closed: oneshot::Receiver<()>,
}

pub async fn start_ws_server() -> ScriptedWsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("ws listener addr");
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
    let (closed_tx, client_closed) = oneshot::channel();

    tokio::spawn(async move {
        let mut closed_tx = Some(closed_tx);
        let (tcp, _) = listener.accept().await.expect("accept ws client");
        let ws = tokio_tungstenite::accept_async(tcp).await.expect("ws handshake");
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                out = outbound_rx.recv() => {
                    match out {
                        Some(message) => {
                            if write.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => {
                            if let Some(tx) = closed_tx.take() {
                                let _ = tx.send(());
                            }
                            return;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }

        while let Some(Ok(message)) = read.next().await {
            if message.is_close() {
                break;
            }
        }
        if let Some(tx) = closed_tx.take() {
            let _ = tx.send(());
        }
    });

    ScriptedWsServer {
        origin: Url::parse(&format!("http://{addr}")).expect("origin url"),
        outbound,
        client_closed,
    }
}
