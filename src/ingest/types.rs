// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

/// A candidate article as produced by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl Article {
    pub fn new(source: &str, title: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            content: String::new(),
            url: url.to_string(),
            author: None,
            image_url: None,
            published_at: None,
            source: source.to_string(),
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Web,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rss" | "feed" => Some(SourceKind::Rss),
            "web" | "markup" => Some(SourceKind::Web),
            _ => None,
        }
    }
}

/// Identity of one configured source, shared by both adapter flavours.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    /// Source trust weight handed to the scorer, in [0,1].
    pub weight: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("http status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError>;

    /// Never fails: a broken source contributes nothing.
    async fn scrape(&self) -> Vec<Article> {
        let d = self.descriptor();
        match self.fetch_latest().await {
            Ok(items) => {
                tracing::info!(source = %d.name, count = items.len(), "source scraped");
                items
            }
            Err(e) => {
                tracing::error!(source = %d.name, error = %e, "source scrape failed");
                counter!("ainews_source_errors_total").increment(1);
                Vec::new()
            }
        }
    }
}
