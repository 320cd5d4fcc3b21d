//! Scrape the winners archive and replace the snapshot file.

use std::sync::Arc;

use anyhow::Context;
use contest_scout::fetch::HttpFetcher;
use contest_scout::winners::write_snapshot;
use contest_scout::{ScraperConfig, WinnersPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    contest_scout::init_tracing();

    let cfg = ScraperConfig::load_default()?;
    let fetcher = HttpFetcher::default().with_timeout(cfg.fetch_timeout_secs);
    let records = WinnersPipeline::new(Arc::new(fetcher), cfg.clone())
        .scrape()
        .await
        .context("scraping winners archive")?;

    write_snapshot(&cfg.winners_path, &records)
        .await
        .context("writing winners snapshot")?;

    tracing::info!(
        target: "winners",
        records = records.len(),
        path = %cfg.winners_path.display(),
        "winners snapshot updated"
    );
    Ok(())
}
