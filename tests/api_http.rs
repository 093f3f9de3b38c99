// tests/api_http.rs
//
// HTTP-level tests for the admin Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use ainews::app::App;
use ainews::config::AppConfig;
use ainews::ingest::types::{Article, SourceAdapter, SourceDescriptor, SourceError, SourceKind};
use ainews::store::{MemoryStore, NewsStore};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;

struct Sleepy(SourceDescriptor);

#[async_trait]
impl SourceAdapter for Sleepy {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.0
    }
    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok(vec![])
    }
}

fn test_app(scheduler: bool) -> App {
    let mut cfg = AppConfig::default();
    cfg.ai.machine_translation = false;
    cfg.scheduler.enabled = scheduler;
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(Sleepy(SourceDescriptor {
        name: "Sleepy".into(),
        url: "https://sleepy.test/rss".into(),
        kind: SourceKind::Rss,
        weight: 0.2,
    }))];
    App::with_store(&cfg, Arc::new(MemoryStore::new()), Some(sources)).expect("app builds")
}

async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = router.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app(false);
    let (status, body) = call(app.router(), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn idle_status_has_no_run_yet() {
    let app = test_app(false);
    let (status, body) = call(app.router(), "GET", "/scrape/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
    assert!(body["last_run"].is_null());
    assert_eq!(body["saved_count"], 0);
    assert!(body["error"].is_null());
    assert!(body["next_run"].is_null(), "scheduler disabled");
}

#[tokio::test]
async fn second_trigger_reports_busy() {
    let app = test_app(true);
    let router = app.router();

    let (status, first) = call(router.clone(), "POST", "/scrape/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);

    let (_, second) = call(router.clone(), "POST", "/scrape/trigger").await;
    assert_eq!(second["success"], false);
    assert!(second["message"].as_str().unwrap().contains("already running"));

    let (_, st) = call(router.clone(), "GET", "/scrape/status").await;
    assert_eq!(st["status"], "running");
    assert!(st["last_run"].is_string());
    assert!(st["next_run"].is_string());

    for _ in 0..100 {
        if !app.controller.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (_, st) = call(router, "GET", "/scrape/status").await;
    assert_eq!(st["status"], "completed");
    assert_eq!(st["saved_count"], 0);
    assert_eq!(app.store.count_news().unwrap(), 0);
}

#[tokio::test]
async fn trigger_requires_post() {
    let app = test_app(false);
    let req = Request::builder()
        .method("GET")
        .uri("/scrape/trigger")
        .body(Body::empty())
        .unwrap();
    let resp = app.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
