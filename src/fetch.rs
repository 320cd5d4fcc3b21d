// src/fetch.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;

use crate::error::{ScrapeError, ScrapeResult};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Retrieves raw HTML for a URL. One attempt, no retries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ScrapeResult<String>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Shared client with the browser-like user agent the site expects.
    pub fn default_client() -> Client {
        Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Self::default_client())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        let t0 = std::time::Instant::now();

        let mut req = self.client.get(url);
        if let Some(t) = self.timeout {
            req = req.timeout(t);
        }
        let resp = req.send().await.map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;

        histogram!("fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::trace!(url, bytes = body.len(), "fetched");
        Ok(body)
    }
}

/// In-memory fetcher backed by a URL -> HTML map. Unknown URLs answer 404.
///
/// Used by tests and offline dry runs; every requested URL is recorded.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, String>>,
    requested: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&self, url: impl Into<String>, html: impl Into<String>) {
        self.pages
            .lock()
            .expect("fixture pages mutex poisoned")
            .insert(url.into(), html.into());
    }

    pub fn remove(&self, url: &str) {
        self.pages
            .lock()
            .expect("fixture pages mutex poisoned")
            .remove(url);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .expect("fixture log mutex poisoned")
            .clone()
    }

    pub fn hits(&self, url: &str) -> usize {
        self.requested().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        self.requested
            .lock()
            .expect("fixture log mutex poisoned")
            .push(url.to_string());

        // Yield once so concurrent callers actually interleave.
        tokio::task::yield_now().await;

        let page = self
            .pages
            .lock()
            .expect("fixture pages mutex poisoned")
            .get(url)
            .cloned();
        page.ok_or_else(|| ScrapeError::Fetch {
            url: url.to_string(),
            status: 404,
        })
    }
}
