use crate::config::FetcherConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

/// Thin wrapper over `reqwest::Client`: one attempt per call, non-2xx is an error.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // The portal sets an ASP.NET session cookie on first contact
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// Fetch a URL as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request error for {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error {} for {}", status, url);
        }

        resp.text().await.context("Failed to read response body")
    }
}
