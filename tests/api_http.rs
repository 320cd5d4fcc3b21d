// tests/api_http.rs
//
// HTTP-level tests for the Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /winners (file snapshot, empty fallback, scrape-on-miss, memory cache)
// - 500 body does not leak internals
// - GET /updateWinners without dispatch config
// - CORS allow-list

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use contest_scout::api::{self, AppState};
use contest_scout::config::{CacheMode, ScraperConfig, ServerConfig};
use contest_scout::fetch::FixtureFetcher;
use contest_scout::winners::{read_snapshot, write_snapshot};
use contest_scout::WinnersRecord;

const BODY_LIMIT: usize = 1024 * 1024;
const ROOT: &str = "https://www.monopoli.gr/diagonismoi/winners/";

fn archive() -> FixtureFetcher {
    FixtureFetcher::new()
        .with_page(ROOT, include_str!("fixtures/winners_single_page.html"))
        .with_page(
            format!("{ROOT}event-1/"),
            include_str!("fixtures/winners_event.html").replace("{TITLE}", "Live"),
        )
}

fn cfg(snapshot: &std::path::Path, server: ServerConfig) -> ScraperConfig {
    ScraperConfig {
        winners_url: ROOT.into(),
        winners_path: snapshot.to_path_buf(),
        server,
        ..ScraperConfig::default()
    }
}

fn app(cfg: ScraperConfig, fetcher: Arc<FixtureFetcher>) -> Router {
    api::router(AppState::new(cfg, fetcher))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(
        cfg(&tmp.path().join("w.json"), ServerConfig::default()),
        Arc::new(FixtureFetcher::new()),
    );
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn winners_served_from_snapshot_without_scraping() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("winners.json");
    let rec = WinnersRecord {
        event_url: "https://x.test/e/".into(),
        event_title: "Cached".into(),
        winners: vec!["A".into()],
    };
    write_snapshot(&path, &[rec]).await.unwrap();

    let fetcher = Arc::new(FixtureFetcher::new());
    let app = app(cfg(&path, ServerConfig::default()), fetcher.clone());

    let (status, v) = get(&app, "/winners").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v[0]["eventTitle"], "Cached");
    assert_eq!(v[0]["eventUrl"], "https://x.test/e/");
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn winners_without_snapshot_is_empty_array() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(archive());
    let app = app(cfg(&tmp.path().join("w.json"), ServerConfig::default()), fetcher.clone());

    let (status, v) = get(&app, "/winners").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, serde_json::json!([]));
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn scrape_on_miss_fills_the_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state/winners.json");
    let server = ServerConfig {
        scrape_on_miss: true,
        ..ServerConfig::default()
    };
    let app = app(cfg(&path, server), Arc::new(archive()));

    let (status, v) = get(&app, "/winners").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v[0]["eventTitle"], "Live");
    assert_eq!(v[0]["winners"].as_array().unwrap().len(), 3);

    let stored = read_snapshot(&path).await.unwrap().expect("snapshot written");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn memory_mode_scrapes_once() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(archive());
    let server = ServerConfig {
        cache_mode: CacheMode::Memory,
        ..ServerConfig::default()
    };
    let app = app(cfg(&tmp.path().join("w.json"), server), fetcher.clone());

    let (s1, v1) = get(&app, "/winners").await;
    let (s2, v2) = get(&app, "/winners").await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(v1, v2);
    assert_eq!(fetcher.hits(&format!("{ROOT}event-1/")), 1);
}

#[tokio::test]
async fn scrape_failure_is_a_generic_500() {
    let tmp = tempfile::tempdir().unwrap();
    let server = ServerConfig {
        cache_mode: CacheMode::Memory,
        ..ServerConfig::default()
    };
    // Archive root missing -> fetch error.
    let app = app(cfg(&tmp.path().join("w.json"), server), Arc::new(FixtureFetcher::new()));

    let (status, v) = get(&app, "/winners").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v, serde_json::json!({ "error": "Failed to fetch winners data" }));
}

#[tokio::test]
async fn update_winners_without_dispatch_config_is_503() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(
        cfg(&tmp.path().join("w.json"), ServerConfig::default()),
        Arc::new(FixtureFetcher::new()),
    );
    let (status, v) = get(&app, "/updateWinners").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(v.get("error").is_some());
}

#[tokio::test]
async fn cors_allow_list_echoes_only_the_configured_origin() {
    let tmp = tempfile::tempdir().unwrap();
    let server = ServerConfig {
        cors_origin: "https://winners.example".into(),
        ..ServerConfig::default()
    };
    let app = app(cfg(&tmp.path().join("w.json"), server), Arc::new(FixtureFetcher::new()));

    let allowed = Request::builder()
        .uri("/health")
        .header("origin", "https://winners.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|h| h.to_str().ok()),
        Some("https://winners.example")
    );

    let other = Request::builder()
        .uri("/health")
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(other).await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn cors_wildcard_allows_any_origin() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(
        cfg(&tmp.path().join("w.json"), ServerConfig::default()),
        Arc::new(FixtureFetcher::new()),
    );
    let req = Request::builder()
        .uri("/health")
        .header("origin", "https://anything.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|h| h.to_str().ok()),
        Some("*")
    );
}
