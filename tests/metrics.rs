// tests/metrics.rs
//
// One recorder per process, so this file holds a single test.

use std::sync::Arc;

use ainews::analyze::Capabilities;
use ainews::config::AppConfig;
use ainews::ingest::providers::FeedAdapter;
use ainews::ingest::types::{SourceAdapter, SourceDescriptor, SourceKind};
use ainews::metrics::Metrics;
use ainews::pipeline::Pipeline;
use ainews::store::MemoryStore;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

#[tokio::test]
async fn run_counters_show_up_on_metrics_endpoint() {
    let metrics = Metrics::init().expect("recorder");

    let mut cfg = AppConfig::default();
    cfg.ai.machine_translation = false;
    let desc = SourceDescriptor {
        name: "Fixture Feed".into(),
        url: "https://feed.test/rss".into(),
        kind: SourceKind::Rss,
        weight: 0.2,
    };
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FeedAdapter::from_fixture(
        desc,
        include_str!("fixtures/ai_feed.xml"),
    ))];
    let p = Pipeline::from_config(
        &cfg,
        Arc::new(MemoryStore::new()),
        &Capabilities::none(),
        Some(sources),
    );
    let report = p.run().await.unwrap();
    assert!(report.saved > 0);

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    for needle in [
        "ainews_runs_total",
        "ainews_articles_scraped_total",
        "ainews_invalid_entries_total",
        "ainews_news_saved_total",
        "ainews_featured_total",
        "ainews_last_run_ts",
    ] {
        assert!(text.contains(needle), "exposition missing '{needle}'\n{text}");
    }
}
