/*
[INPUT]:  Page origin (or stream URL) of the queue service push endpoint
[OUTPUT]: Decoded task updates via an mpsc channel + connection state via watch
[POS]:    WebSocket layer - push channel connection handling
[UPDATE]: When changing connection lifecycle, framing, or log sampling
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{OrchestraError, Result};
use crate::ws::message::{StreamEvent, UpdateEnvelope};

/// Default push endpoint path below the page origin
pub const DEFAULT_STREAM_PATH: &str = "/ws";
const EVENT_CHANNEL_CAPACITY: usize = 256;
const IGNORED_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static IGNORED_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Push channel lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Created, `connect` not called yet
    Idle,
    Connecting,
    Open,
    Closed,
    /// Connection could not be established
    Error(String),
}

/// Derive the push endpoint from the page origin: same host and port,
/// `http` becomes `ws` and `https` becomes `wss`.
pub fn stream_url(origin: &Url, stream_path: &str) -> Result<Url> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(OrchestraError::Config(format!(
                "unsupported origin scheme: {other}"
            )));
        }
    };

    let mut url = origin.join(stream_path)?;
    url.set_scheme(scheme)
        .map_err(|_| OrchestraError::Config(format!("cannot use scheme {scheme} for {origin}")))?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// One push channel connection.
///
/// A `TaskStream` connects once. Reconnecting means building a new one. The
/// reader task is cancelled when the stream is closed or dropped, so the
/// socket is always released.
#[derive(Debug)]
pub struct TaskStream {
    event_tx: Option<mpsc::Sender<StreamEvent>>,
    event_rx: Option<mpsc::Receiver<StreamEvent>>,
    state: watch::Sender<StreamState>,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl TaskStream {
    /// Create a new, unconnected stream
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state, _rx) = watch::channel(StreamState::Idle);
        Self {
            event_tx: Some(tx),
            event_rx: Some(rx),
            state,
            shutdown: CancellationToken::new(),
            reader: None,
        }
    }

    /// Get the event receiver. Only `task_update` events are delivered; the
    /// receiver yields `None` once the connection has ended.
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        self.event_rx.take()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    /// Open the connection and start the reader task
    pub async fn connect(&mut self, url: &Url) -> Result<()> {
        let Some(event_tx) = self.event_tx.take() else {
            return Err(OrchestraError::Stream(
                "stream already connected".to_string(),
            ));
        };

        self.state.send_replace(StreamState::Connecting);
        info!(url = %url, "connecting task stream");

        let ws_stream = match connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => ws_stream,
            Err(err) => {
                let message = err.to_string();
                warn!(url = %url, error = %message, "task stream connect failed");
                self.state.send_replace(StreamState::Error(message.clone()));
                return Err(OrchestraError::Stream(message));
            }
        };

        self.state.send_replace(StreamState::Open);
        info!(url = %url, "task stream open");

        let (mut write, mut read) = ws_stream.split();
        let shutdown = self.shutdown.clone();
        let state = self.state.clone();

        self.reader = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        debug!("task stream closed locally");
                        break;
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Close(frame))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                info!(?frame, "task stream closed by server");
                                break;
                            }
                            Some(Ok(WsMessage::Ping(_)))
                            | Some(Ok(WsMessage::Pong(_)))
                            | Some(Ok(WsMessage::Frame(_))) => {}
                            Some(Ok(message)) => {
                                let Some(event) = Self::parse_message(message) else {
                                    continue;
                                };
                                tokio::select! {
                                    _ = shutdown.cancelled() => {
                                        let _ = write.send(WsMessage::Close(None)).await;
                                        break;
                                    }
                                    sent = event_tx.send(event) => {
                                        if sent.is_err() {
                                            debug!("task stream receiver dropped");
                                            let _ = write.send(WsMessage::Close(None)).await;
                                            break;
                                        }
                                    }
                                }
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "task stream read failed");
                                break;
                            }
                            None => {
                                info!("task stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            state.send_replace(StreamState::Closed);
        }));

        Ok(())
    }

    /// Close the connection and wait for the reader task to finish
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(reader) = self.reader.take()
            && let Err(err) = reader.await
        {
            warn!(error = %err, "task stream reader panicked");
        }
        if matches!(*self.state.borrow(), StreamState::Idle) {
            self.state.send_replace(StreamState::Closed);
        }
    }

    /// Decode one socket message into an event worth forwarding.
    fn parse_message(message: WsMessage) -> Option<StreamEvent> {
        let text: String = match message {
            WsMessage::Text(text) => text.to_string(),
            WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(err) => {
                    log_parse_fail_once(&err.to_string(), "<non-utf8 binary>");
                    return None;
                }
            },
            _ => return None,
        };

        match UpdateEnvelope::decode(&text) {
            Ok(event @ StreamEvent::TaskUpdate(_)) => Some(event),
            Ok(StreamEvent::Ignored { kind }) => {
                log_ignored_once(&kind);
                None
            }
            Err(err) => {
                log_parse_fail_once(&err.to_string(), &text);
                None
            }
        }
    }
}

impl Default for TaskStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskStream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn log_ignored_once(kind: &str) {
    let count = IGNORED_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < IGNORED_LOG_LIMIT {
        debug!(
            sample_index = count + 1,
            sample_limit = IGNORED_LOG_LIMIT,
            kind,
            "ws envelope kind unrecognized"
        );
    }
}

fn log_parse_fail_once(err: &str, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        warn!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message dropped"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %preview,
            "ws message dropped"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut cut = max_len;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 3);
    out.push_str(&value[..cut]);
    out.push_str("...");
    out
}
