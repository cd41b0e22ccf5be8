/*
[INPUT]:  Configured client, push endpoint URL, snapshot paging, reconnect policy
[OUTPUT]: Live task view + connection/snapshot state via `watch`, scoped teardown
[POS]:    Session layer - wires snapshot, push channel and store together
[UPDATE]: When changing snapshot/stream ordering, reconnect behavior, or shutdown semantics
*/

use std::time::Duration;

use orchestra_client::{
    OrchestraClient, OrchestraError, Result, StreamEvent, Task, TaskQuery, TaskStream,
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatcher::ActionDispatcher;
use crate::snapshot::SnapshotLoader;
use crate::store::{TaskStore, TaskView};

const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
const INPUT_CHANNEL_CAPACITY: usize = 256;
const STABLE_CONNECTION: Duration = Duration::from_secs(10);

/// Push channel state as seen by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { retry_count: u32 },
    /// Terminal. Either shut down or reconnecting gave up.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Pending,
    Loaded { count: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Consecutive failed attempts (connect errors or connections that
    /// dropped before becoming healthy) before giving up
    pub max_retries: u32,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: DEFAULT_MAX_RETRIES,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl ReconnectPolicy {
    /// A single connection; the session stays read-only once it closes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// 1s, 2s, 4s ... capped at `max_backoff`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exp = retry_count.saturating_sub(1).min(63);
        let secs = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub stream_url: Url,
    pub snapshot_query: TaskQuery,
    pub reconnect: ReconnectPolicy,
}

#[derive(Debug)]
enum SessionInput {
    Snapshot(Result<Vec<Task>>),
    Update(StreamEvent),
    /// Stream came back after a disconnect; reload to cover the gap.
    Resync,
}

/// One monitoring session: a snapshot, a push channel and the live view.
///
/// All writes to the view go through a single consumer task. Dropping the
/// session (or calling [`MonitorSession::shutdown`]) closes the push channel
/// and stops processing.
#[derive(Debug)]
pub struct MonitorSession {
    view: TaskView,
    dispatcher: ActionDispatcher,
    connection_state: watch::Receiver<ConnectionState>,
    snapshot_state: watch::Receiver<SnapshotState>,
    shutdown: CancellationToken,
    consumer: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
}

impl MonitorSession {
    /// Start the snapshot load and the push channel concurrently.
    pub fn start(client: OrchestraClient, settings: SessionSettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            OrchestraError::Config("monitor session requires a Tokio runtime".to_string())
        })?;

        let shutdown = CancellationToken::new();
        let store = TaskStore::new();
        let view = store.view();
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (connection_tx, connection_state) = watch::channel(ConnectionState::Connecting);
        let (snapshot_tx, snapshot_state) = watch::channel(SnapshotState::Pending);

        info!(
            stream_url = %settings.stream_url,
            api_base_url = %client.api_base_url(),
            reconnect = settings.reconnect.enabled,
            "starting monitor session"
        );

        let consumer = SessionWorker {
            store,
            loader: SnapshotLoader::new(client.clone(), settings.snapshot_query),
            input_tx: input_tx.clone(),
            input_rx,
            snapshot_state: snapshot_tx,
            shutdown: shutdown.clone(),
            snapshot_pending: false,
            resync_requested: false,
            buffered: Vec::new(),
            snapshot_task: None,
        };
        let supervisor = StreamSupervisor {
            stream_url: settings.stream_url,
            policy: settings.reconnect,
            input_tx,
            connection_state: connection_tx,
            shutdown: shutdown.clone(),
        };

        let consumer = runtime.spawn(consumer.run());
        let supervisor = runtime.spawn(supervisor.run());

        Ok(Self {
            view,
            dispatcher: ActionDispatcher::new(client, shutdown.clone()),
            connection_state,
            snapshot_state,
            shutdown,
            consumer: Some(consumer),
            supervisor: Some(supervisor),
        })
    }

    pub fn view(&self) -> TaskView {
        self.view.clone()
    }

    pub fn dispatcher(&self) -> ActionDispatcher {
        self.dispatcher.clone()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.clone()
    }

    pub fn subscribe_snapshot_state(&self) -> watch::Receiver<SnapshotState> {
        self.snapshot_state.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Close the push channel and wait for both workers to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for (name, handle) in [
            ("supervisor", self.supervisor.take()),
            ("consumer", self.consumer.take()),
        ] {
            if let Some(handle) = handle
                && let Err(err) = handle.await
            {
                warn!(worker = name, error = %err, "session worker panicked");
            }
        }
        info!("monitor session stopped");
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Single writer of the task store.
struct SessionWorker {
    store: TaskStore,
    loader: SnapshotLoader,
    input_tx: mpsc::Sender<SessionInput>,
    input_rx: mpsc::Receiver<SessionInput>,
    snapshot_state: watch::Sender<SnapshotState>,
    shutdown: CancellationToken,
    snapshot_pending: bool,
    resync_requested: bool,
    /// Updates held back while a snapshot is outstanding, in arrival order
    buffered: Vec<StreamEvent>,
    snapshot_task: Option<JoinHandle<()>>,
}

impl SessionWorker {
    async fn run(mut self) {
        self.begin_snapshot();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                input = self.input_rx.recv() => {
                    match input {
                        Some(input) => self.handle(input),
                        None => break,
                    }
                }
            }
        }

        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
        debug!(buffered = self.buffered.len(), "session consumer stopped");
    }

    fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Update(event) if self.snapshot_pending => {
                self.buffered.push(event);
            }
            SessionInput::Update(event) => {
                self.store.apply_event(event);
            }
            SessionInput::Snapshot(result) => self.finish_snapshot(result),
            SessionInput::Resync if self.snapshot_pending => {
                self.resync_requested = true;
            }
            SessionInput::Resync => {
                info!("push channel reconnected; reloading snapshot");
                self.begin_snapshot();
            }
        }
    }

    fn begin_snapshot(&mut self) {
        self.snapshot_pending = true;
        self.snapshot_state.send_replace(SnapshotState::Pending);

        let loader = self.loader.clone();
        let input_tx = self.input_tx.clone();
        self.snapshot_task = Some(tokio::spawn(async move {
            let result = loader.fetch_all().await;
            let _ = input_tx.send(SessionInput::Snapshot(result)).await;
        }));
    }

    fn finish_snapshot(&mut self, result: Result<Vec<Task>>) {
        self.snapshot_pending = false;
        self.snapshot_task = None;

        let settled = match result {
            Ok(tasks) => {
                let count = tasks.len();
                let changed = self.store.apply_snapshot(tasks);
                debug!(count, changed, "snapshot merged");
                SnapshotState::Loaded { count }
            }
            Err(err) => SnapshotState::Failed {
                message: err.operator_message(),
            },
        };

        let replayed = self.buffered.len();
        for event in self.buffered.drain(..) {
            self.store.apply_event(event);
        }
        if replayed > 0 {
            debug!(replayed, "buffered updates replayed");
        }
        self.snapshot_state.send_replace(settled);

        if std::mem::take(&mut self.resync_requested) {
            self.begin_snapshot();
        }
    }
}

enum StreamExit {
    Shutdown,
    Disconnected { delivered: usize },
}

/// Owns the push channel: connects, forwards updates, reconnects.
///
/// Every connect failure and every connection that drops before it proved
/// healthy counts as a failed attempt toward `max_retries` and is followed by
/// a backoff. A connection is healthy once it delivered an update or stayed
/// open for `STABLE_CONNECTION`.
struct StreamSupervisor {
    stream_url: Url,
    policy: ReconnectPolicy,
    input_tx: mpsc::Sender<SessionInput>,
    connection_state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl StreamSupervisor {
    async fn run(self) {
        let mut retry_count: u32 = 0;
        let mut connected_before = false;

        'run: loop {
            if self.shutdown.is_cancelled() {
                break 'run;
            }

            let mut stream = TaskStream::new();
            let Some(mut events) = stream.take_receiver() else {
                break 'run;
            };

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                result = stream.connect(&self.stream_url) => result,
            };

            let failure = match connected {
                Ok(()) => {
                    self.connection_state.send_replace(ConnectionState::Open);
                    if connected_before && self.input_tx.send(SessionInput::Resync).await.is_err() {
                        stream.close().await;
                        break 'run;
                    }
                    connected_before = true;

                    let opened_at = Instant::now();
                    let exit = self.forward(&mut events).await;
                    stream.close().await;
                    match exit {
                        StreamExit::Shutdown => break 'run,
                        StreamExit::Disconnected { delivered } => {
                            let uptime = opened_at.elapsed();
                            if delivered > 0 || uptime >= STABLE_CONNECTION {
                                retry_count = 0;
                            }
                            debug!(delivered, ?uptime, "push channel connection ended");
                            "push channel closed".to_string()
                        }
                    }
                }
                Err(err) => err.to_string(),
            };

            if !self.policy.enabled {
                info!(error = %failure, "push channel down; reconnect disabled");
                break 'run;
            }

            retry_count = retry_count.saturating_add(1);
            if retry_count >= self.policy.max_retries {
                warn!(
                    retry_count,
                    max_retries = self.policy.max_retries,
                    error = %failure,
                    "push channel gave up reconnecting"
                );
                break 'run;
            }

            let backoff = self.policy.backoff(retry_count);
            self.connection_state
                .send_replace(ConnectionState::Reconnecting { retry_count });
            warn!(retry_count, ?backoff, error = %failure, "push channel down; retrying with backoff");

            tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        self.connection_state.send_replace(ConnectionState::Closed);
        debug!("stream supervisor stopped");
    }

    async fn forward(&self, events: &mut mpsc::Receiver<StreamEvent>) -> StreamExit {
        let mut delivered = 0;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return StreamExit::Shutdown,
                event = events.recv() => {
                    let Some(event) = event else {
                        return StreamExit::Disconnected { delivered };
                    };
                    if self.input_tx.send(SessionInput::Update(event)).await.is_err() {
                        return StreamExit::Shutdown;
                    }
                    delivered += 1;
                }
            }
        }
    }
}
