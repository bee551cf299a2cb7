//! Shared HTTP plumbing for the metadata clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header;

use crate::error::SourceError;
use crate::rate_limit::RateLimiter;

/// Per-source client configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Minimum spacing between consecutive requests.
    pub min_interval: Duration,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: impl Into<String>, min_interval: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            user_agent: user_agent.into(),
            min_interval,
        }
    }
}

/// Rate-limited GET client with uniform status handling.
#[derive(Debug, Clone)]
pub(crate) struct SourceHttp {
    http: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    source: &'static str,
    accept: &'static str,
}

impl SourceHttp {
    pub(crate) fn new(config: &SourceConfig, source: &'static str, accept: &'static str) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Network(Arc::new(e)))?;

        Ok(Self { http, rate_limiter: Arc::new(RateLimiter::new(config.min_interval)), source, accept })
    }

    /// GET `url` with query parameters and return the body text.
    pub(crate) async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        tracing::debug!(source = self.source, url, "requesting metadata");

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, self.accept)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(source = self.source, %status, elapsed = ?start.elapsed(), "metadata response");

        if status == 429 || (status == 503 && self.source == "musicbrainz") {
            return Err(SourceError::RateLimited);
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(SourceError::HttpError { status: status.as_u16() });
        }

        Ok(response.text().await?)
    }
}
