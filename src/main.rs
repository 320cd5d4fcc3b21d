//! Winners service entrypoint.
//! Boots the Axum HTTP server serving the cached winners archive.

use contest_scout::{api, metrics::Metrics, ScraperConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    contest_scout::init_tracing();

    let cfg = ScraperConfig::load_default()?;
    tracing::info!(
        target: "api",
        cache_mode = ?cfg.server.cache_mode,
        cors_origin = %cfg.server.cors_origin,
        snapshot = %cfg.winners_path.display(),
        "starting winners service"
    );

    let state = api::AppState::from_config(cfg);
    let mut router = api::router(state);

    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(target: "api", "metrics disabled: {e:#}"),
    }

    Ok(router.into())
}
