/*
[INPUT]:  CLI arguments, layered configuration, OS shutdown signals
[OUTPUT]: Live task watcher or one-shot create/retry commands with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orchestra_client::{Priority, TaskDraft, TaskType};
use orchestra_monitor::render::{connection_label, snapshot_label, view_table};
use orchestra_monitor::{ActionDispatcher, ConnectionState, MonitorConfig, MonitorSession, Notice};

#[derive(Parser, Debug)]
#[command(name = "orchestra-monitor", version, about = "Live monitor for the Orchestra task queue")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    /// Queue service page origin, overrides configuration
    #[arg(long, value_name = "URL", global = true)]
    origin: Option<String>,
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load all tasks, then follow live updates until interrupted
    Watch,
    /// Submit a new task
    Create {
        #[arg(long, default_value = "io_bound")]
        task_type: TaskType,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long, default_value = orchestra_client::DEFAULT_PAYLOAD)]
        payload: String,
        /// Delay in seconds; non-numeric or negative values mean no delay
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        delay: String,
        #[arg(long, value_name = "KEY", conflicts_with = "generate_key")]
        idempotency_key: Option<String>,
        /// Send a freshly generated idempotency key
        #[arg(long)]
        generate_key: bool,
    },
    /// Ask the service to retry a failed task
    Retry { id: i64 },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = MonitorConfig::load(args.config_path.as_deref()).context("load config")?;
    if let Some(origin) = args.origin {
        config.origin = origin;
        config.validate().context("validate --origin")?;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    let _guard = init_tracing(&config.log.level, config.log.file.as_deref())?;
    info!(origin = %config.origin, "configuration loaded");

    match args.command {
        Command::Watch => watch(&config).await,
        Command::Create {
            task_type,
            priority,
            payload,
            delay,
            idempotency_key,
            generate_key,
        } => {
            let draft = TaskDraft {
                task_type,
                payload,
                priority,
                delay,
            };
            let key = idempotency_key.or_else(|| generate_key.then(|| Uuid::new_v4().to_string()));
            let dispatcher = ActionDispatcher::new(config.client()?, CancellationToken::new());
            let result = dispatcher.create_task(draft, key.as_deref()).await;
            if let Ok(task) = &result {
                info!(task_id = task.id, status = %task.status, "task accepted");
            }
            report(Notice::for_create(&result))
        }
        Command::Retry { id } => {
            let dispatcher = ActionDispatcher::new(config.client()?, CancellationToken::new());
            let result = dispatcher.retry_task(id).await;
            report(Notice::for_retry(id, &result))
        }
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

async fn watch(config: &MonitorConfig) -> Result<()> {
    let session = MonitorSession::start(config.client()?, config.session_settings()?)
        .context("start monitor session")?;
    let shutdown = session.shutdown_token();
    setup_signal_handlers(shutdown.clone());

    let mut view = session.view();
    let mut connection = session.subscribe_connection_state();
    let mut snapshot = session.subscribe_snapshot_state();
    let mut snapshot_live = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown signal received");
                break;
            }
            state = view.changed() => {
                let Some(state) = state else { break };
                print!("{}", view_table(&state));
            }
            changed = snapshot.changed(), if snapshot_live => {
                if changed.is_err() {
                    snapshot_live = false;
                    continue;
                }
                let label = snapshot_label(&snapshot.borrow_and_update());
                eprintln!("[snapshot] {label}");
            }
            changed = connection.changed() => {
                let state = connection.borrow_and_update().clone();
                eprintln!("[stream] {}", connection_label(&state));
                if changed.is_err() || state == ConnectionState::Closed {
                    warn!("push channel closed; stopping watcher");
                    break;
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn report(notice: Option<Notice>) -> Result<()> {
    match notice {
        Some(notice) if notice.is_error() => Err(anyhow!(notice.to_string())),
        Some(notice) => {
            println!("{notice}");
            Ok(())
        }
        None => bail!("session closed before the request completed"),
    }
}

fn init_tracing(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let guard = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Some(guard)
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            None
        }
    };
    Ok(guard)
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
