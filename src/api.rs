use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{CacheMode, ScraperConfig};
use crate::dispatch::WorkflowDispatcher;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::winners::{read_snapshot, write_snapshot, WinnersPipeline, WinnersRecord};

type Memo = Arc<Mutex<Option<Arc<Vec<WinnersRecord>>>>>;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<ScraperConfig>,
    fetcher: Arc<dyn PageFetcher>,
    dispatcher: Option<WorkflowDispatcher>,
    memo: Memo,
}

impl AppState {
    pub fn new(cfg: ScraperConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            fetcher,
            dispatcher: None,
            memo: Arc::new(Mutex::new(None)),
        }
    }

    /// Live fetcher, dispatcher from env.
    pub fn from_config(cfg: ScraperConfig) -> Self {
        let fetcher = HttpFetcher::default().with_timeout(cfg.fetch_timeout_secs);
        Self::new(cfg, Arc::new(fetcher)).with_dispatcher(WorkflowDispatcher::from_env())
    }

    pub fn with_dispatcher(mut self, dispatcher: Option<WorkflowDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn pipeline(&self) -> WinnersPipeline {
        WinnersPipeline::new(self.fetcher.clone(), (*self.cfg).clone())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cfg.server.cors_origin);
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/winners", get(get_winners))
        .route("/updateWinners", get(update_winners))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let origin = origin.trim();
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(v) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(v))
            .allow_methods([Method::GET]),
        Err(e) => {
            tracing::warn!(target: "api", origin, error = %e, "invalid cors origin, cross-origin requests denied");
            CorsLayer::new()
        }
    }
}

/// 500 with a fixed message; details only go to the log.
struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(target: "api", "Error fetching winners data: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Failed to fetch winners data" })),
        )
            .into_response()
    }
}

async fn get_winners(State(state): State<AppState>) -> Result<Json<Vec<WinnersRecord>>, ApiError> {
    counter!("winners_requests_total").increment(1);
    match state.cfg.server.cache_mode {
        CacheMode::File => winners_from_file(&state).await,
        CacheMode::Memory => winners_from_memory(&state).await,
    }
}

async fn winners_from_file(state: &AppState) -> Result<Json<Vec<WinnersRecord>>, ApiError> {
    let path = &state.cfg.winners_path;
    if let Some(cached) = read_snapshot(path).await? {
        tracing::debug!(target: "api", "Returning cached data...");
        return Ok(Json(cached));
    }
    if !state.cfg.server.scrape_on_miss {
        return Ok(Json(Vec::new()));
    }

    tracing::info!(target: "api", "no snapshot yet, scraping winners");
    let fresh = state.pipeline().scrape().await?;
    if let Err(e) = write_snapshot(path, &fresh).await {
        tracing::warn!(target: "api", error = %e, "could not store winners snapshot");
    }
    Ok(Json(fresh))
}

async fn winners_from_memory(state: &AppState) -> Result<Json<Vec<WinnersRecord>>, ApiError> {
    // Held across the scrape so concurrent first requests share one scrape.
    let mut memo = state.memo.lock().await;
    if let Some(cached) = memo.as_ref() {
        return Ok(Json(cached.as_ref().clone()));
    }
    let fresh = Arc::new(state.pipeline().scrape().await?);
    *memo = Some(fresh.clone());
    Ok(Json(fresh.as_ref().clone()))
}

async fn update_winners(State(state): State<AppState>) -> Response {
    match &state.dispatcher {
        Some(d) => {
            d.spawn_dispatch();
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "status": "dispatched" })),
            )
                .into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "workflow dispatch not configured" })),
        )
            .into_response(),
    }
}
