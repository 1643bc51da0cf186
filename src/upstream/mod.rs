//! Outbound client for the market-data API.
//!
//! [`UpstreamClient`] is the seam the proxy depends on; [`HttpUpstream`] is
//! the `reqwest` implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Default bound on a single upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an upstream call produced no usable JSON.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status.
    #[error("upstream responded with status {0}")]
    Status(u16),

    /// Connection, DNS, TLS, timeout, or body read failure.
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The body was not valid JSON.
    #[error("upstream body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Performs a GET against a fully formed URL and returns the JSON body.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// # Errors
    ///
    /// See [`UpstreamError`] for the failure classes.
    async fn fetch_json(&self, url: &str) -> Result<Value, UpstreamError>;
}

/// Settings for [`HttpUpstream`].
#[derive(Debug, Clone)]
pub struct UpstreamOptions {
    pub timeout: Duration,
    /// Accept any certificate the upstream presents.
    pub insecure_skip_verify: bool,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            insecure_skip_verify: true,
        }
    }
}

/// `reqwest`-backed [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Fails when the TLS backend cannot be initialised.
    pub fn new(options: &UpstreamOptions) -> Result<Self, reqwest::Error> {
        if options.insecure_skip_verify {
            warn!("upstream TLS certificate verification is disabled");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .user_agent(concat!("dexproxy/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn fetch_json(&self, url: &str) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "upstream responded");
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(UpstreamError::Transport)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
