// src/store/mod.rs
//! Persistence seam consumed by the pipeline: dedup lookups, lazy Source
//! creation, batch inserts and the featured pass.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::SourceKind;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type NewsId = i64;

/// Fixed category buckets, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Breakthrough,
    ProductLaunch,
    Funding,
    Policy,
    Industry,
    Research,
    Interview,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Breakthrough,
        Category::ProductLaunch,
        Category::Funding,
        Category::Policy,
        Category::Industry,
        Category::Research,
        Category::Interview,
        Category::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Breakthrough => "breakthrough",
            Category::ProductLaunch => "product-launch",
            Category::Funding => "funding",
            Category::Policy => "policy",
            Category::Industry => "industry",
            Category::Research => "research",
            Category::Interview => "interview",
            Category::Other => "other",
        }
    }

    /// Lenient lookup: case, surrounding punctuation and `_`/space vs `-` are ignored.
    pub fn from_name(s: &str) -> Option<Self> {
        let key = s
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_ascii_lowercase()
            .replace(['_', ' '], "-");
        Self::ALL.into_iter().find(|c| c.name() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub enabled: bool,
}

/// A fully enriched row ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNews {
    pub title: String,
    pub title_translated: Option<String>,
    pub content: String,
    pub summary: String,
    pub summary_translated: Option<String>,
    /// Already normalized.
    pub url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source_id: i64,
    pub category_id: Option<i64>,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub importance_score: f64,
    pub keywords: Vec<String>,
    pub language: String,
    pub is_processed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct News {
    pub id: NewsId,
    #[serde(flatten)]
    pub data: NewNews,
    pub is_featured: bool,
}

/// Minimal projection used by the featured pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNews {
    pub id: NewsId,
    pub importance_score: f64,
}

/// What happened to each row of a batch insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub inserted: Vec<NewsId>,
    /// (url, reason) of rows rolled back.
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate url: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Other(String),
}

pub trait NewsStore: Send + Sync {
    /// Idempotent.
    fn seed_categories(&self) -> Result<(), StoreError>;

    fn category_id(&self, category: Category) -> Result<Option<i64>, StoreError>;

    /// Returns the existing Source when the name is already known.
    fn find_or_create_source(
        &self,
        name: &str,
        url: &str,
        kind: SourceKind,
    ) -> Result<Source, StoreError>;

    fn url_exists(&self, normalized_url: &str) -> Result<bool, StoreError>;

    /// Titles of News published at or after `since`.
    fn titles_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    /// Single-row insert; duplicate URL is `StoreError::Conflict`.
    fn insert_news(&self, news: &NewNews) -> Result<NewsId, StoreError>;

    /// All rows in one transaction; each row isolated so a failing row is
    /// rolled back and reported without affecting the others.
    fn insert_batch(&self, batch: &[NewNews]) -> Result<BatchOutcome, StoreError>;

    /// Not-yet-featured News published at or after `since`.
    fn unfeatured_since(&self, since: DateTime<Utc>) -> Result<Vec<ScoredNews>, StoreError>;

    /// Sets the featured flag; never clears one.
    fn mark_featured(&self, ids: &[NewsId]) -> Result<usize, StoreError>;

    fn count_news(&self) -> Result<usize, StoreError>;

    fn get_news(&self, id: NewsId) -> Result<Option<News>, StoreError>;
}
