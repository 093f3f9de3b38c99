// tests/store_sqlite.rs
//
// File-backed SQLite store: schema on open, URL uniqueness, featured flags.

use ainews::ingest::normalize_url;
use ainews::ingest::types::SourceKind;
use ainews::store::{Category, NewNews, NewsStore, SqliteStore, StoreError};
use chrono::{Duration, Utc};

fn news(url: &str, source_id: i64) -> NewNews {
    let now = Utc::now();
    NewNews {
        title: "Model card published".into(),
        title_translated: Some("模型卡发布".into()),
        content: "body".into(),
        summary: "body".into(),
        summary_translated: None,
        url: normalize_url(url),
        image_url: Some("https://img.test/1.png".into()),
        author: Some("A. Writer".into()),
        source_id,
        category_id: None,
        published_at: now - Duration::hours(3),
        scraped_at: now,
        importance_score: 0.42,
        keywords: vec!["model".into(), "card".into()],
        language: "en".into(),
        is_processed: true,
    }
}

#[test]
fn normalized_equal_urls_leave_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("nested/ainews.db")).unwrap();
    let src = store
        .find_or_create_source("Feed", "https://feed.test", SourceKind::Rss)
        .unwrap();

    store.insert_news(&news("https://x.test/post/", src.id)).unwrap();
    let err = store
        .insert_news(&news("https://x.test/post?utm_source=a", src.id))
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let out = store
        .insert_batch(&[
            news("https://x.test/post//", src.id),
            news("https://x.test/fresh", src.id),
        ])
        .unwrap();
    assert_eq!(out.inserted.len(), 1);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].0, "https://x.test/post");
    assert_eq!(store.count_news().unwrap(), 2);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ainews.db");
    let id = {
        let store = SqliteStore::open(&path).unwrap();
        store.seed_categories().unwrap();
        let src = store
            .find_or_create_source("Feed", "https://feed.test", SourceKind::Rss)
            .unwrap();
        let mut n = news("https://x.test/keep", src.id);
        n.category_id = store.category_id(Category::Research).unwrap();
        store.insert_news(&n).unwrap()
    };

    let store = SqliteStore::open(&path).unwrap();
    store.seed_categories().unwrap();
    let got = store.get_news(id).unwrap().expect("row persisted");
    assert_eq!(got.data.url, "https://x.test/keep");
    assert_eq!(got.data.title_translated.as_deref(), Some("模型卡发布"));
    assert_eq!(got.data.category_id, store.category_id(Category::Research).unwrap());
    assert!(!got.is_featured);
    assert_eq!(store.count_news().unwrap(), 1);
}
