//! # Discovery Pipeline
//!
//! category pages → listing links → contest code → available dates.
//!
//! Codes already in the [`Ledger`] are skipped; new ones are marked seen and
//! expanded into one [`DiscoveryRecord`] per available date. The full ledger
//! is written back once at the end of the run.
//!
//! Per-link failures (fetch or parse) are logged and leave no trace in the
//! ledger, so the link is retried on the next run.

use std::sync::{Arc, Mutex};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::batch::run_bounded;
use crate::config::ScraperConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::Document;
use crate::fetch::PageFetcher;
use crate::ledger::Ledger;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("discovery_links_total", "Listing links examined.");
        describe_counter!("discovery_codes_new_total", "Contest codes seen for the first time.");
        describe_counter!("discovery_records_total", "(code, date) records emitted.");
        describe_counter!(
            "discovery_link_errors_total",
            "Listing or date pages that failed to fetch or parse."
        );
    });
}

/// One submittable (contest, date) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub id: String,
    pub date: String,
    pub link: String,
}

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub records: Vec<DiscoveryRecord>,
    pub links_seen: usize,
    pub new_codes: usize,
    pub known_codes: usize,
    pub links_without_code: usize,
    pub failed_links: Vec<String>,
}

impl DiscoveryReport {
    /// "No new events since last time".
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
enum LinkOutcome {
    NoCode,
    Known,
    New { code: String, dates: Vec<String> },
    Failed(ScrapeError),
}

pub struct DiscoveryPipeline {
    fetcher: Arc<dyn PageFetcher>,
    cfg: ScraperConfig,
}

impl DiscoveryPipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cfg: ScraperConfig) -> Self {
        Self { fetcher, cfg }
    }

    /// Full run: collect links, load ledger, process, persist.
    ///
    /// A ledger write failure is returned as an error: the codes processed in
    /// this run would be processed again next time.
    pub async fn run(&self) -> ScrapeResult<DiscoveryReport> {
        ensure_metrics_described();

        let links = self.collect_links().await;
        let ledger = self.open_ledger().await?;
        let before = ledger.len();

        let (report, ledger) = self.process_links(links, ledger).await;
        ledger.persist().await?;

        if report.is_empty() {
            tracing::info!(target: "discovery", links = report.links_seen, "No new events since last time");
        } else {
            tracing::info!(
                target: "discovery",
                records = report.records.len(),
                new_codes = report.new_codes,
                ledger_before = before,
                ledger_after = ledger.len(),
                failed = report.failed_links.len(),
                "Total new events: {}",
                report.records.len()
            );
        }
        Ok(report)
    }

    /// Listing links from every category, concatenated in category order.
    /// Duplicates across categories are kept.
    pub async fn collect_links(&self) -> Vec<String> {
        let per_category = run_bounded(
            self.cfg.categories.clone(),
            self.cfg.max_concurrency,
            |url| async move {
                match self.fetcher.fetch(&url).await {
                    Ok(html) => listing_links_from(&html, &url).unwrap_or_else(|e| {
                        tracing::warn!(target: "discovery", url = %url, error = %e, "category parse failed");
                        Vec::new()
                    }),
                    Err(e) => {
                        tracing::warn!(target: "discovery", url = %url, error = %e, "category fetch failed");
                        Vec::new()
                    }
                }
            },
        )
        .await;

        let links: Vec<String> = per_category.into_iter().flatten().collect();
        tracing::debug!(target: "discovery", links = links.len(), "candidate listing links");
        links
    }

    pub async fn open_ledger(&self) -> ScrapeResult<Ledger> {
        if self.cfg.bypass_ledger {
            tracing::info!(target: "discovery", "ledger bypassed for this run");
            return Ok(Ledger::ephemeral());
        }
        Ledger::load(&self.cfg.ledger_path).await
    }

    /// Resolve every link against `ledger`, returning the records and the
    /// updated ledger. The ledger is not persisted here.
    pub async fn process_links(
        &self,
        links: Vec<String>,
        ledger: Ledger,
    ) -> (DiscoveryReport, Ledger) {
        ensure_metrics_described();
        let ledger = Mutex::new(ledger);
        let mut report = DiscoveryReport {
            links_seen: links.len(),
            ..DiscoveryReport::default()
        };

        let outcomes = run_bounded(links, self.cfg.discovery_concurrency, |link| {
            let ledger = &ledger;
            async move {
                let outcome = self.process_link(&link, ledger).await;
                (link, outcome)
            }
        })
        .await;

        counter!("discovery_links_total").increment(report.links_seen as u64);

        for (link, outcome) in outcomes {
            match outcome {
                LinkOutcome::NoCode => report.links_without_code += 1,
                LinkOutcome::Known => report.known_codes += 1,
                LinkOutcome::New { code, dates } => {
                    report.new_codes += 1;
                    if dates.is_empty() {
                        tracing::info!(target: "discovery", code = %code, link = %link, "contest has no available dates");
                    }
                    report.records.extend(dates.into_iter().map(|date| DiscoveryRecord {
                        id: code.clone(),
                        date,
                        link: link.clone(),
                    }));
                }
                LinkOutcome::Failed(e) => {
                    tracing::warn!(target: "discovery", link = %link, error = %e, "listing skipped");
                    counter!("discovery_link_errors_total").increment(1);
                    report.failed_links.push(link);
                }
            }
        }

        counter!("discovery_codes_new_total").increment(report.new_codes as u64);
        counter!("discovery_records_total").increment(report.records.len() as u64);

        let ledger = ledger
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (report, ledger)
    }

    async fn process_link(&self, link: &str, ledger: &Mutex<Ledger>) -> LinkOutcome {
        let html = match self.fetcher.fetch(link).await {
            Ok(h) => h,
            Err(e) => return LinkOutcome::Failed(e),
        };
        let code = match code_from(&html, link) {
            Ok(Some(c)) => c,
            Ok(None) => return LinkOutcome::NoCode,
            Err(e) => return LinkOutcome::Failed(e),
        };

        // Check-then-mark is one critical section; the lock is never held across an await.
        let is_new = lock(ledger).append(code.clone());
        if !is_new {
            tracing::trace!(target: "discovery", code = %code, "already processed");
            return LinkOutcome::Known;
        }

        let date_url = self.cfg.date_page_url(&code);
        let dates = match self.fetcher.fetch(&date_url).await {
            Ok(h) => dates_from(&h, &date_url),
            Err(e) => Err(e),
        };
        let dates = match dates {
            Ok(d) => d,
            Err(e) => {
                lock(ledger).remove(&code);
                return LinkOutcome::Failed(e);
            }
        };

        if dates.is_empty() && self.cfg.forget_dateless {
            lock(ledger).remove(&code);
        }
        LinkOutcome::New { code, dates }
    }
}

fn lock(ledger: &Mutex<Ledger>) -> std::sync::MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Parsing stays in sync helpers: `scraper::Html` must not live across an await.

fn listing_links_from(html: &str, url: &str) -> ScrapeResult<Vec<String>> {
    Ok(Document::parse(html, url)?.listing_links())
}

fn code_from(html: &str, url: &str) -> ScrapeResult<Option<String>> {
    Ok(Document::parse(html, url)?.contest_code())
}

fn dates_from(html: &str, url: &str) -> ScrapeResult<Vec<String>> {
    Ok(Document::parse(html, url)?.available_dates())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FixtureFetcher;

    const CAT: &str = "https://site.test/cat/";

    fn cfg() -> ScraperConfig {
        ScraperConfig {
            categories: vec![CAT.into()],
            contest_form_url: "https://site.test/contest-form/".into(),
            bypass_ledger: true,
            ..ScraperConfig::default()
        }
    }

    fn listing(code: &str) -> String {
        format!(r#"<a class="diagonismos_btn" href="/contest-form/{code}/">Συμμετοχή</a>"#)
    }

    #[tokio::test]
    async fn same_code_on_two_links_is_processed_once() {
        let f = FixtureFetcher::new()
            .with_page(CAT, r#"<a class="category_item" href="/a/">a</a><a class="g_small_tile" href="/b/">b</a>"#)
            .with_page("https://site.test/a/", listing("5"))
            .with_page("https://site.test/b/", listing("5"))
            .with_page(
                "https://site.test/contest-form/5/",
                r#"<input name="date" value="d1">"#,
            );
        let f = Arc::new(f);
        let p = DiscoveryPipeline::new(f.clone(), cfg());

        let report = p.run().await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.known_codes, 1);
        assert_eq!(f.hits("https://site.test/contest-form/5/"), 1);
    }

    #[tokio::test]
    async fn date_page_failure_rolls_back_the_mark() {
        let f = Arc::new(
            FixtureFetcher::new().with_page("https://site.test/a/", listing("9")),
        );
        let p = DiscoveryPipeline::new(f, cfg());
        let (report, ledger) = p
            .process_links(vec!["https://site.test/a/".into()], Ledger::ephemeral())
            .await;
        assert!(report.records.is_empty());
        assert_eq!(report.failed_links, vec!["https://site.test/a/".to_string()]);
        assert!(!ledger.contains("9"));
    }

    #[tokio::test]
    async fn dateless_code_is_kept_or_forgotten_per_config() {
        let f = Arc::new(
            FixtureFetcher::new()
                .with_page("https://site.test/a/", listing("3"))
                .with_page("https://site.test/contest-form/3/", "<p>closed</p>"),
        );

        let keep = DiscoveryPipeline::new(f.clone(), cfg());
        let (r, l) = keep
            .process_links(vec!["https://site.test/a/".into()], Ledger::ephemeral())
            .await;
        assert!(r.records.is_empty());
        assert_eq!(r.new_codes, 1);
        assert!(l.contains("3"));

        let forget = DiscoveryPipeline::new(
            f,
            ScraperConfig {
                forget_dateless: true,
                ..cfg()
            },
        );
        let (_, l) = forget
            .process_links(vec!["https://site.test/a/".into()], Ledger::ephemeral())
            .await;
        assert!(!l.contains("3"));
    }

    #[tokio::test]
    async fn listing_without_code_is_skipped_silently() {
        let f = Arc::new(FixtureFetcher::new().with_page("https://site.test/a/", "<p>ad</p>"));
        let p = DiscoveryPipeline::new(f, cfg());
        let (r, l) = p
            .process_links(vec!["https://site.test/a/".into()], Ledger::ephemeral())
            .await;
        assert_eq!(r.links_without_code, 1);
        assert!(r.failed_links.is_empty());
        assert!(l.is_empty());
    }
}
