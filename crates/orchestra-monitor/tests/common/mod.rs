/*
[INPUT]:  Session test scenarios needing a queue service double
[OUTPUT]: Mock REST server helpers + multi-connection scripted push server
[POS]:    Test infrastructure - shared across session tests
[UPDATE]: When adding new test patterns or fixtures
*/

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use orchestra_client::{DEFAULT_STREAM_PATH, OrchestraClient, TaskQuery, stream_url};
use orchestra_monitor::{ReconnectPolicy, SessionSettings};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;
use wiremock::MockServer;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

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

pub fn task_update_text(id: i64, status: &str) -> WsMessage {
    let envelope = serde_json::json!({
        "event": "task_update",
        "data": task_json(id, status),
    });
    WsMessage::Text(envelope.to_string().into())
}

pub fn client_for(server: &MockServer) -> OrchestraClient {
    OrchestraClient::new(&format!("{}/api/v1/", server.uri())).expect("client")
}

pub fn settings_for(ws: &WsServer, reconnect: ReconnectPolicy) -> SessionSettings {
    SessionSettings {
        stream_url: stream_url(&ws.origin, DEFAULT_STREAM_PATH).expect("stream url"),
        snapshot_query: TaskQuery::default(),
        reconnect,
    }
}

/// One accepted client connection
pub struct WsConnection {
    /// Frames to push; dropping it closes the socket from the server side
    pub outbound: mpsc::UnboundedSender<WsMessage>,
    /// Fires once the client has closed (or dropped) the connection
    pub client_closed: oneshot::Receiver<()>,
}

/// Push server that accepts any number of connections, one at a time
pub struct WsServer {
    pub origin: Url,
    connections: mpsc::UnboundedReceiver<WsConnection>,
}

impl WsServer {
    pub async fn next_connection(&mut self) -> WsConnection {
        timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .expect("client connected in time")
            .expect("ws server alive")
    }

    /// `None` when no client connects within `wait`
    pub async fn try_next_connection(&mut self, wait: Duration) -> Option<WsConnection> {
        timeout(wait, self.connections.recv()).await.ok().flatten()
    }
}

pub async fn start_ws_server() -> WsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("ws listener addr");
    let (connections_tx, connections) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            let (outbound, outbound_rx) = mpsc::unbounded_channel();
            let (closed_tx, client_closed) = oneshot::channel();
            if connections_tx
                .send(WsConnection {
                    outbound,
                    client_closed,
                })
                .is_err()
            {
                break;
            }
            tokio::spawn(serve_connection(ws, outbound_rx, closed_tx));
        }
    });

    WsServer {
        origin: Url::parse(&format!("http://{addr}")).expect("origin url"),
        connections,
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
    closed_tx: oneshot::Sender<()>,
) {
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
                        let _ = closed_tx.send(());
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
    let _ = closed_tx.send(());
}
