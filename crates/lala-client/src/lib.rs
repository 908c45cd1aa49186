use std::cmp::min;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use types::{unix_ms, TelemetrySnapshot};

pub const LALA_PATH: &str = "/lala.cgi";

/// Asks the device for every field of the three telemetry categories. Dictated by the firmware.
pub const REQUEST_BODY: &str = r#"{"STATISTIC":{},"ENERGY":{},"BMS":{}}"#;

/// Options for talking to the device's local HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host or `host:port` of the device.
    pub host: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries per fetch after the initial attempt.
    pub retry_count: usize,
    /// Base delay between retries in milliseconds (exponential backoff).
    pub retry_backoff_ms: u64,
    /// Upper bound for retry backoff delay in milliseconds.
    pub retry_max_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            timeout_ms: 5_000,
            retry_count: 0,
            retry_backoff_ms: 250,
            retry_max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
    #[error("http client setup failed: {0}")]
    Build(reqwest::Error),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device answered with status {status}")]
    Status { status: u16 },
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json body is not an object")]
    NotAnObject,
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct LalaClient {
    config: ClientConfig,
    url: Url,
    http: Client,
}

impl LalaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let host = config.host.trim();
        if host.is_empty() || host.contains('/') {
            return Err(ClientError::InvalidAddress(config.host.clone()));
        }
        let url = Url::parse(&format!("http://{host}{LALA_PATH}"))
            .map_err(|_| ClientError::InvalidAddress(config.host.clone()))?;
        let http = Client::builder().build().map_err(ClientError::Build)?;

        Ok(Self { config, url, http })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Fetches a complete snapshot, retrying per the configured policy.
    pub async fn fetch(&self) -> Result<TelemetrySnapshot, ClientError> {
        let mut attempts = 0usize;

        loop {
            let result = timeout(Duration::from_millis(self.config.timeout_ms), self.fetch_once()).await;
            let err = match result {
                Ok(Ok(snapshot)) => return Ok(snapshot),
                Ok(Err(err)) => {
                    warn!(host = %self.config.host, attempt = attempts, error = %err, "lala fetch failed");
                    err
                }
                Err(_) => {
                    warn!(host = %self.config.host, attempt = attempts, "lala fetch timeout");
                    ClientError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    }
                }
            };

            if attempts >= self.config.retry_count {
                return Err(err);
            }

            let delay_ms = self.retry_delay_ms(attempts);
            attempts += 1;
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn fetch_once(&self) -> Result<TelemetrySnapshot, ClientError> {
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(REQUEST_BODY)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        let snapshot = TelemetrySnapshot::from_value(value, unix_ms()).ok_or(ClientError::NotAnObject)?;
        debug!(host = %self.config.host, bytes = body.len(), "lala fetch ok");
        Ok(snapshot)
    }

    fn retry_delay_ms(&self, attempt: usize) -> u64 {
        let base = self.config.retry_backoff_ms.max(1);
        let shift = u32::try_from(attempt).unwrap_or(u32::MAX);
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor);
        let max = self.config.retry_max_backoff_ms.max(base);
        min(delay, max)
    }
}
