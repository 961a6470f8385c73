//! HTTP client for Amazon product pages using wreq for TLS fingerprint emulation.

use crate::amazon::navigation::PageSource;
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Amazon HTTP client with browser impersonation.
pub struct AmazonClient {
    client: Client,
}

impl AmazonClient {
    /// Creates a new Amazon client with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self { client })
    }

    /// Fetches a page and returns its HTML.
    pub async fn get(&self, url: &str, accept_language: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", accept_language)
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 503 {
            warn!("Rate limited (503). Consider using a proxy.");
            anyhow::bail!("Rate limited by Amazon. Try again later or use a proxy.");
        }

        if !status.is_success() {
            anyhow::bail!("Request failed with status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    /// Returns a [`PageSource`] that re-fetches `url` on every snapshot.
    pub fn page<'a>(&'a self, url: &str, accept_language: Option<&'static str>) -> RemotePage<'a> {
        RemotePage {
            client: self,
            url: url.to_string(),
            accept_language: accept_language.unwrap_or(DEFAULT_ACCEPT_LANGUAGE),
        }
    }
}

/// A product page fetched over HTTP.
pub struct RemotePage<'a> {
    client: &'a AmazonClient,
    url: String,
    accept_language: &'static str,
}

#[async_trait]
impl PageSource for RemotePage<'_> {
    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn snapshot(&self) -> Result<String> {
        info!("Fetching product page: {}", self.url);
        self.client.get(&self.url, self.accept_language).await
    }
}
