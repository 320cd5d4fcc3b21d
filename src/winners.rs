// src/winners.rs
//! Winners archive: paginate the archive, collect every contest link, then
//! pull title + winner lines from each contest page. Stateless; each run
//! re-scrapes everything.

use std::path::Path;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::batch::try_run_bounded;
use crate::config::ScraperConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{Document, EventDetails};
use crate::fetch::PageFetcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnersRecord {
    pub event_url: String,
    pub event_title: String,
    pub winners: Vec<String>,
}

pub struct WinnersPipeline {
    fetcher: Arc<dyn PageFetcher>,
    cfg: ScraperConfig,
}

impl WinnersPipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cfg: ScraperConfig) -> Self {
        Self { fetcher, cfg }
    }

    /// Page count from the archive's first page, capped by `max_pages`.
    pub async fn total_pages(&self) -> ScrapeResult<u32> {
        let url = self.cfg.winners_page_url(1);
        let html = self.fetcher.fetch(&url).await?;
        let found = pages_from(&html, &url)?;
        Ok(match self.cfg.max_pages {
            Some(cap) => found.min(cap),
            None => found,
        })
    }

    /// Contest links across pages `1..=total`, flattened in page order.
    pub async fn event_links(&self, total: u32) -> ScrapeResult<Vec<String>> {
        let pages: Vec<u32> = (1..=total).collect();
        let per_page = try_run_bounded(pages, self.cfg.max_concurrency, |n| async move {
            let url = self.cfg.winners_page_url(n);
            let html = self.fetcher.fetch(&url).await?;
            links_from(&html, &url)
        })
        .await?;
        Ok(per_page.into_iter().flatten().collect())
    }

    pub async fn event_details(&self, url: &str) -> ScrapeResult<EventDetails> {
        let html = self.fetcher.fetch(url).await?;
        details_from(&html, url)
    }

    /// Full scrape. Any failed page or contest aborts the run, so a partial
    /// result never replaces a complete snapshot.
    pub async fn scrape(&self) -> ScrapeResult<Vec<WinnersRecord>> {
        let total = self.total_pages().await?;
        tracing::info!(target: "winners", pages = total, "fetching all event links");

        let links = self.event_links(total).await?;
        tracing::info!(target: "winners", links = links.len(), "total event links fetched");

        let details = try_run_bounded(links.clone(), self.cfg.max_concurrency, |url| async move {
            self.event_details(&url).await
        })
        .await?;
        tracing::info!(target: "winners", details = details.len(), "total event details fetched");

        let records: Vec<WinnersRecord> = links
            .into_iter()
            .zip(details)
            .map(|(event_url, d)| WinnersRecord {
                event_url,
                event_title: d.event_title,
                winners: d.winners,
            })
            .collect();
        counter!("winners_records_total").increment(records.len() as u64);
        Ok(records)
    }
}

fn pages_from(html: &str, url: &str) -> ScrapeResult<u32> {
    Ok(Document::parse(html, url)?.total_pages())
}

fn links_from(html: &str, url: &str) -> ScrapeResult<Vec<String>> {
    Ok(Document::parse(html, url)?.winners_links())
}

fn details_from(html: &str, url: &str) -> ScrapeResult<EventDetails> {
    Ok(Document::parse(html, url)?.event_details())
}

/// Replace the snapshot file with `records` (pretty JSON).
pub async fn write_snapshot(path: &Path, records: &[WinnersRecord]) -> ScrapeResult<()> {
    let body = serde_json::to_vec_pretty(records).map_err(|source| ScrapeError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| ScrapeError::Persistence {
                path: dir.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, body)
        .await
        .map_err(|source| ScrapeError::Persistence {
            path: path.to_path_buf(),
            source,
        })
}

/// `Ok(None)` when no snapshot has been written yet.
pub async fn read_snapshot(path: &Path) -> ScrapeResult<Option<Vec<WinnersRecord>>> {
    let raw = match fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ScrapeError::Persistence {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ScrapeError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
}
