// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod batch;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ledger;
pub mod metrics;
pub mod submit;
pub mod winners;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::ScraperConfig;
pub use crate::discovery::{DiscoveryPipeline, DiscoveryRecord, DiscoveryReport};
pub use crate::error::{ScrapeError, ScrapeResult};
pub use crate::winners::{WinnersPipeline, WinnersRecord};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Subsystem targets used by the pipelines, plus the crate's own module paths.
pub const DEFAULT_LOG_FILTER: &str =
    "contest_scout=info,discovery=info,winners=info,api=info,submit=info,warn";

pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_LOG_FILTER)
}

/// Compact fmt logs filtered by `RUST_LOG` (default [`DEFAULT_LOG_FILTER`]).
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(true))
        .try_init();
}
