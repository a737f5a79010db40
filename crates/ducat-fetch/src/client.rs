//! HTTP client for downloading bi5 files.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{AttemptError, Transport, url::BASE_URL};

/// Configuration for the download client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Datafeed base URL.
    pub base_url: String,
    /// Maximum idle pooled connections per host.
    pub pool_size: usize,
    /// Request timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Connection timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            pool_size: 10,
            timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("ducat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Pooled HTTP client making single attempts against the datafeed.
#[derive(Debug, Clone)]
pub struct DownloadClient {
    client: Client,
    config: ClientConfig,
}

impl DownloadClient {
    /// Creates a new download client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_size)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for DownloadClient {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn get(&self, url: &str) -> Result<Option<Bytes>, AttemptError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AttemptError::from_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        Ok(Some(body))
    }
}

/// Maps a transport-level reqwest error onto an attempt outcome.
fn classify(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Timeout
    } else if error.is_connect() || error.is_request() {
        AttemptError::Connect(error.to_string())
    } else {
        AttemptError::Body(error.to_string())
    }
}
