/*
[INPUT]:  Built-in defaults, optional YAML file, ORCHESTRA__* environment overrides
[OUTPUT]: Validated monitor configuration + derived client/session settings
[POS]:    Configuration layer - endpoint, paging, reconnect and log setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use config::{Config, Environment, File, FileFormat};
use orchestra_client::{
    ClientConfig, DEFAULT_API_PATH, DEFAULT_STREAM_PATH, OrchestraClient, TaskQuery, stream_url,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::session::{ReconnectPolicy, SessionSettings};

const ENV_PREFIX: &str = "ORCHESTRA";
const CONFIG_DIR_NAME: &str = "orchestra-monitor";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Top-level configuration for the monitor
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Page origin of the queue service, e.g. `http://localhost:8000`
    pub origin: String,
    pub api_path: String,
    pub stream_path: String,
    pub http: HttpConfig,
    pub snapshot: SnapshotConfig,
    pub reconnect: ReconnectConfig,
    pub log: LogConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            http: HttpConfig::default(),
            snapshot: SnapshotConfig::default(),
            reconnect: ReconnectConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
        }
    }
}

/// Optional paging for the snapshot request. Unset means no query params.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub max_backoff_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            enabled: policy.enabled,
            max_retries: policy.max_retries,
            max_backoff_secs: policy.max_backoff.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `orchestra_client=debug`
    pub level: String,
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a YAML file only, without environment overrides
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Layered load: defaults, then the YAML file, then `ORCHESTRA__*` env vars.
    ///
    /// Without an explicit path the per-user config file is used when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default()).context("encode default config")?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
            }
            None => {
                if let Some(path) = default_config_path().filter(|path| path.is_file()) {
                    builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
                }
            }
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("decode configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            bail!("origin must use http or https, got {}", origin.scheme());
        }
        if self.reconnect.enabled && self.reconnect.max_retries == 0 {
            bail!("reconnect.max_retries must be at least 1 when reconnect is enabled");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn origin_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("invalid origin: {}", self.origin))
    }

    pub fn client(&self) -> anyhow::Result<OrchestraClient> {
        let config = ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
        };
        OrchestraClient::for_origin(config, &self.origin_url()?, &self.api_path)
            .context("build http client")
    }

    pub fn session_settings(&self) -> anyhow::Result<SessionSettings> {
        let stream_url =
            stream_url(&self.origin_url()?, &self.stream_path).context("derive stream url")?;
        Ok(SessionSettings {
            stream_url,
            snapshot_query: TaskQuery {
                skip: self.snapshot.skip,
                limit: self.snapshot.limit,
            },
            reconnect: ReconnectPolicy {
                enabled: self.reconnect.enabled,
                max_retries: self.reconnect.max_retries,
                max_backoff: Duration::from_secs(self.reconnect.max_backoff_secs),
            },
        })
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("encode configuration")
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
