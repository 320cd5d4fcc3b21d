//! One discovery run: find new contests, persist the ledger, then enter every
//! registrant in the roster. `--dry-run` (or `DRY_RUN=1`) stops after discovery.

use std::sync::Arc;

use anyhow::Context;
use contest_scout::config::roster::{load_roster_from, resolve_roster_path};
use contest_scout::fetch::{HttpFetcher, PageFetcher};
use contest_scout::submit::{HttpSubmitter, SubmissionDriver};
use contest_scout::{DiscoveryPipeline, ScraperConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    contest_scout::init_tracing();

    let dry_run = std::env::args().any(|a| a == "--dry-run")
        || std::env::var("DRY_RUN").is_ok_and(|v| v == "1");

    let cfg = ScraperConfig::load_default()?;
    let client = HttpFetcher::default_client();
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::new(client.clone()).with_timeout(cfg.fetch_timeout_secs));

    let report = DiscoveryPipeline::new(fetcher, cfg.clone())
        .run()
        .await
        .context("discovery run")?;

    if report.is_empty() || dry_run {
        for r in &report.records {
            println!("{}\t{}\t{}", r.id, r.date, r.link);
        }
        return Ok(());
    }

    let roster_path = resolve_roster_path(&cfg.roster_path);
    let roster = match load_roster_from(&roster_path) {
        Ok(r) if !r.is_empty() => r,
        Ok(_) => {
            tracing::warn!(target: "submit", path = %roster_path.display(), "roster is empty, nothing to submit");
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(target: "submit", "no roster, skipping submissions: {e:#}");
            return Ok(());
        }
    };

    let submitter = HttpSubmitter::new(client, cfg.contest_form_url.clone());
    let summary = SubmissionDriver::new(Arc::new(submitter))
        .with_delay_ms(cfg.submit_delay_ms)
        .submit_all(&report.records, &roster)
        .await;

    tracing::info!(
        target: "submit",
        dispatched = summary.dispatched,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "submissions finished"
    );
    Ok(())
}
