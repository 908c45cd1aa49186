use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use lala_client::ClientConfig;
use poller_actor::ActorConfig;
use senec_decoder::{find_spec, known_reading_ids};

const DEFAULT_STATE_PATH: &str = "senec-state.sqlite";
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8089";

#[derive(Clone, Debug)]
pub struct SenecConfig {
    /// Device address lives in `client.host`.
    pub client: ClientConfig,
    pub poller: ActorConfig,
    pub monitored_conditions: Vec<String>,
    pub state_path: String,
    pub http_bind: String,
}

impl SenecConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn host(&self) -> &str {
        &self.client.host
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.host.trim().is_empty() {
            anyhow::bail!("senec.host is required");
        }
        if self.poller.poll_interval.is_zero() {
            anyhow::bail!("senec.scan_interval_ms must be >= 1");
        }
        if self.client.timeout_ms == 0 {
            anyhow::bail!("client.timeout_ms must be >= 1");
        }
        if self.client.retry_backoff_ms == 0 {
            anyhow::bail!("client.retry_backoff_ms must be >= 1");
        }
        if self.client.retry_max_backoff_ms == 0 {
            anyhow::bail!("client.retry_max_backoff_ms must be >= 1");
        }
        if self.monitored_conditions.is_empty() {
            anyhow::bail!("senec.monitored_conditions must name at least one reading");
        }
        for id in &self.monitored_conditions {
            if find_spec(id).is_none() {
                anyhow::bail!(
                    "senec.monitored_conditions contains unknown reading {id:?} (known: {})",
                    known_reading_ids().collect::<Vec<_>>().join(", ")
                );
            }
        }
        if self.state_path.trim().is_empty() {
            anyhow::bail!("state.path must be non-empty");
        }
        self.http_bind
            .parse::<SocketAddr>()
            .map_err(|_| anyhow::anyhow!("http.bind must be a socket address (e.g. 0.0.0.0:8089)"))?;

        Ok(())
    }
}

impl Default for SenecConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            poller: ActorConfig::default(),
            monitored_conditions: known_reading_ids().map(str::to_string).collect(),
            state_path: DEFAULT_STATE_PATH.to_string(),
            http_bind: DEFAULT_HTTP_BIND.to_string(),
        }
    }
}

fn apply_env_overrides(config: &mut SenecConfig) {
    if let Ok(value) = env::var("SENEC_HOST") {
        config.client.host = value;
    }

    if let Some(interval_ms) = parse_env_u64("SENEC_SCAN_INTERVAL_MS") {
        config.poller.poll_interval = Duration::from_millis(interval_ms);
    }

    if let Ok(value) = env::var("SENEC_MONITORED_CONDITIONS") {
        config.monitored_conditions = parse_conditions(&value);
    }

    if let Some(timeout_ms) = parse_env_u64("SENEC_TIMEOUT_MS") {
        config.client.timeout_ms = timeout_ms;
    }

    if let Some(retry_count) = parse_env_usize("SENEC_RETRY_COUNT") {
        config.client.retry_count = retry_count;
    }

    if let Some(jitter_ms) = parse_env_u64("SENEC_JITTER_MS") {
        config.poller.jitter_ms = jitter_ms;
    }

    if let Ok(value) = env::var("SENEC_STATE_PATH") {
        config.state_path = value;
    }

    if let Ok(value) = env::var("SENEC_HTTP_BIND") {
        config.http_bind = value;
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    senec: Option<FileSenecConfig>,
    client: Option<FileClientConfig>,
    poller: Option<FilePollerConfig>,
    state: Option<FileStateConfig>,
    http: Option<FileHttpConfig>,
}

#[derive(Debug, Deserialize)]
struct FileSenecConfig {
    host: Option<String>,
    scan_interval_ms: Option<u64>,
    monitored_conditions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FileClientConfig {
    timeout_ms: Option<u64>,
    retry_count: Option<usize>,
    retry_backoff_ms: Option<u64>,
    retry_max_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    jitter_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileStateConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileHttpConfig {
    bind: Option<String>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("SENEC_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut SenecConfig, file: FileConfig) {
    if let Some(senec) = file.senec {
        if let Some(host) = senec.host {
            config.client.host = host;
        }
        if let Some(interval_ms) = senec.scan_interval_ms {
            config.poller.poll_interval = Duration::from_millis(interval_ms);
        }
        if let Some(conditions) = senec.monitored_conditions {
            config.monitored_conditions = conditions;
        }
    }

    if let Some(client) = file.client {
        if let Some(timeout_ms) = client.timeout_ms {
            config.client.timeout_ms = timeout_ms;
        }
        if let Some(retry_count) = client.retry_count {
            config.client.retry_count = retry_count;
        }
        if let Some(backoff) = client.retry_backoff_ms {
            config.client.retry_backoff_ms = backoff;
        }
        if let Some(max_backoff) = client.retry_max_backoff_ms {
            config.client.retry_max_backoff_ms = max_backoff;
        }
    }

    if let Some(poller) = file.poller {
        if let Some(jitter_ms) = poller.jitter_ms {
            config.poller.jitter_ms = jitter_ms;
        }
    }

    if let Some(state) = file.state {
        if let Some(path) = state.path {
            config.state_path = path;
        }
    }

    if let Some(http) = file.http {
        if let Some(bind) = http.bind {
            config.http_bind = bind;
        }
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Comma separated reading identifiers; blanks are dropped.
pub fn parse_conditions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
