// tests/pipeline_e2e.rs
//
// Full runs over fixture sources with a real SQLite file and no capabilities.

use std::sync::Arc;

use ainews::analyze::Capabilities;
use ainews::config::AppConfig;
use ainews::ingest::providers::FeedAdapter;
use ainews::ingest::types::{Article, SourceAdapter, SourceDescriptor, SourceError, SourceKind};
use ainews::pipeline::Pipeline;
use ainews::store::{Category, MemoryStore, NewNews, NewsStore, SqliteStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

fn feed_desc(weight: f64) -> SourceDescriptor {
    SourceDescriptor {
        name: "Lab Feed".into(),
        url: "https://lab.test/rss".into(),
        kind: SourceKind::Rss,
        weight,
    }
}

fn rss(items: &[(&str, &str, &str, DateTime<Utc>)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Lab</title>"#);
    for (title, link, body, date) in items {
        xml.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><description>{body}</description><pubDate>{}</pubDate></item>",
            date.to_rfc2822()
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

fn seed(store: &dyn NewsStore, title: &str, url: &str, at: DateTime<Utc>) {
    let src = store
        .find_or_create_source("Earlier", "https://earlier.test", SourceKind::Rss)
        .unwrap();
    store
        .insert_news(&NewNews {
            title: title.into(),
            title_translated: None,
            content: String::new(),
            summary: title.into(),
            summary_translated: None,
            url: url.into(),
            image_url: None,
            author: None,
            source_id: src.id,
            category_id: None,
            published_at: at,
            scraped_at: at,
            importance_score: 0.3,
            keywords: vec![],
            language: "en".into(),
            is_processed: true,
        })
        .unwrap();
}

fn quiet_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.ai.machine_translation = false;
    cfg
}

#[tokio::test]
async fn url_dup_and_similar_title_leave_one_insert() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn NewsStore> = Arc::new(SqliteStore::open(dir.path().join("e2e.db")).unwrap());
    let now = Utc::now();
    seed(store.as_ref(), "OpenAI unveils GPT-5 with stronger reasoning", "https://news.test/a", now - Duration::days(1));
    seed(store.as_ref(), "Anthropic releases Claude 5 for enterprise customers", "https://news.test/b", now - Duration::days(1));

    let xml = rss(&[
        ("Something totally different", "https://news.test/a/?utm_source=rss", "Body one", now),
        ("Anthropic releases Claude 5 for enterprise customer", "https://other.test/x", "Body two", now),
        ("DeepMind publishes protein folding paper", "https://news.test/new", "Body three", now),
    ]);
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FeedAdapter::from_fixture(feed_desc(0.2), &xml))];
    let p = Pipeline::from_config(&quiet_config(), store.clone(), &Capabilities::none(), Some(sources));

    let report = p.run().await.unwrap();
    assert_eq!(report.scraped, 3);
    assert_eq!(report.duplicates, 2);
    assert_eq!(report.saved, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.count_news().unwrap(), 3);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].saved, 1);

    // a second run over the same feed saves nothing new
    let again = p.run().await.unwrap();
    assert_eq!(again.saved, 0);
    assert_eq!(store.count_news().unwrap(), 3);
}

#[tokio::test]
async fn stale_empty_article_scores_source_term_only() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let xml = rss(&[("Quarterly note", "https://lab.test/note", "", now - Duration::days(10))]);

    let mut cfg = quiet_config();
    cfg.processing.scoring.source_weight = 0.25;
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FeedAdapter::from_fixture(feed_desc(0.8), &xml))];
    let p = Pipeline::from_config(&cfg, store.clone(), &Capabilities::none(), Some(sources));
    p.run().await.unwrap();

    let rows = store.all_news();
    assert_eq!(rows.len(), 1);
    let n = &rows[0].data;
    // keyword 0, length 0, recency 0 → 0.8 × 0.25
    assert!((n.importance_score - 0.2).abs() < 1e-9, "got {}", n.importance_score);
    assert!(n.content.is_empty());
    assert_eq!(n.summary, "Quarterly note");
    assert_eq!(n.category_id, store.category_id(Category::Other).unwrap());
    assert_eq!(n.language, "en");
    assert!(n.is_processed);
}

#[tokio::test]
async fn enrichment_fills_every_field() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let xml = rss(&[(
        "Startup raises funding for agent research",
        "https://lab.test/funding?ref=home",
        "The round was led by a large investment firm.",
        now - Duration::hours(2),
    )]);
    let mut cfg = quiet_config();
    cfg.keywords.medium_priority = vec!["agent".into()];
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FeedAdapter::from_fixture(feed_desc(0.2), &xml))];
    let p = Pipeline::from_config(&cfg, store.clone(), &Capabilities::none(), Some(sources));
    p.run().await.unwrap();

    let rows = store.all_news();
    let n = &rows[0].data;
    assert_eq!(n.url, "https://lab.test/funding");
    assert_eq!(n.category_id, store.category_id(Category::Funding).unwrap());
    assert_eq!(n.summary, "The round was led by a large investment firm.");
    // glossary fallback
    assert_eq!(
        n.title_translated.as_deref(),
        Some("初创公司 raises 融资 for agent 研究")
    );
    assert_eq!(
        n.summary_translated.as_deref(),
        Some("The round was led by a large investment firm.")
    );
    assert!(n.keywords.contains(&"startup".to_string()));
    assert!(n.keywords.len() <= 10);
    assert_eq!(store.sources()[0].name, "Lab Feed");
    // sole eligible row is featured
    assert!(rows[0].is_featured);
}

struct Failing(SourceDescriptor);

#[async_trait]
impl SourceAdapter for Failing {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.0
    }
    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError> {
        Err(SourceError::Fetch {
            url: self.0.url.clone(),
            message: "connection refused".into(),
        })
    }
}

#[tokio::test]
async fn broken_source_does_not_stop_the_run() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let xml = rss(&[("Robotics lab opens", "https://lab.test/robotics", "Short.", now)]);
    let sources: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(Failing(SourceDescriptor {
            name: "Down".into(),
            url: "https://down.test/rss".into(),
            kind: SourceKind::Rss,
            weight: 0.2,
        })),
        Box::new(FeedAdapter::from_fixture(feed_desc(0.2), &xml)),
    ];
    let p = Pipeline::from_config(&quiet_config(), store.clone(), &Capabilities::none(), Some(sources));
    let report = p.run().await.unwrap();

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.sources[0].scraped, 0);
    assert_eq!(report.saved, 1);
    // the failing source never got a row
    assert_eq!(store.sources().len(), 1);
}
