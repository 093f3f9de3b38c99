// src/store/memory.rs
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{
    BatchOutcome, Category, NewNews, News, NewsId, NewsStore, ScoredNews, Source, StoreError,
};
use crate::ingest::types::SourceKind;

/// In-process store with the same uniqueness rules as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sources: Vec<Source>,
    categories: Vec<(Category, i64)>,
    news: Vec<News>,
    next_news_id: NewsId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Snapshot of every stored row, in insertion order.
    pub fn all_news(&self) -> Vec<News> {
        self.lock().map(|g| g.news.clone()).unwrap_or_default()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.lock().map(|g| g.sources.clone()).unwrap_or_default()
    }
}

impl Inner {
    fn insert(&mut self, n: &NewNews) -> Result<NewsId, StoreError> {
        if self.news.iter().any(|x| x.data.url == n.url) {
            return Err(StoreError::Conflict(n.url.clone()));
        }
        self.next_news_id += 1;
        let id = self.next_news_id;
        self.news.push(News {
            id,
            data: n.clone(),
            is_featured: false,
        });
        Ok(id)
    }
}

impl NewsStore for MemoryStore {
    fn seed_categories(&self) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        for c in Category::ALL {
            if !g.categories.iter().any(|(x, _)| *x == c) {
                let id = g.categories.len() as i64 + 1;
                g.categories.push((c, id));
            }
        }
        Ok(())
    }

    fn category_id(&self, category: Category) -> Result<Option<i64>, StoreError> {
        let g = self.lock()?;
        Ok(g.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, id)| *id))
    }

    fn find_or_create_source(
        &self,
        name: &str,
        url: &str,
        kind: SourceKind,
    ) -> Result<Source, StoreError> {
        let mut g = self.lock()?;
        if let Some(s) = g.sources.iter().find(|s| s.name == name) {
            return Ok(s.clone());
        }
        let s = Source {
            id: g.sources.len() as i64 + 1,
            name: name.to_string(),
            url: url.to_string(),
            kind,
            enabled: true,
        };
        g.sources.push(s.clone());
        Ok(s)
    }

    fn url_exists(&self, normalized_url: &str) -> Result<bool, StoreError> {
        let g = self.lock()?;
        Ok(g.news.iter().any(|n| n.data.url == normalized_url))
    }

    fn titles_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let g = self.lock()?;
        Ok(g.news
            .iter()
            .filter(|n| n.data.published_at >= since)
            .map(|n| n.data.title.clone())
            .collect())
    }

    fn insert_news(&self, news: &NewNews) -> Result<NewsId, StoreError> {
        self.lock()?.insert(news)
    }

    fn insert_batch(&self, batch: &[NewNews]) -> Result<BatchOutcome, StoreError> {
        let mut g = self.lock()?;
        let mut out = BatchOutcome::default();
        for n in batch {
            match g.insert(n) {
                Ok(id) => out.inserted.push(id),
                Err(e) => out.skipped.push((n.url.clone(), e.to_string())),
            }
        }
        Ok(out)
    }

    fn unfeatured_since(&self, since: DateTime<Utc>) -> Result<Vec<ScoredNews>, StoreError> {
        let g = self.lock()?;
        Ok(g.news
            .iter()
            .filter(|n| !n.is_featured && n.data.published_at >= since)
            .map(|n| ScoredNews {
                id: n.id,
                importance_score: n.data.importance_score,
            })
            .collect())
    }

    fn mark_featured(&self, ids: &[NewsId]) -> Result<usize, StoreError> {
        let mut g = self.lock()?;
        let mut changed = 0;
        for n in g.news.iter_mut().filter(|n| ids.contains(&n.id)) {
            if !n.is_featured {
                n.is_featured = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn count_news(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.news.len())
    }

    fn get_news(&self, id: NewsId) -> Result<Option<News>, StoreError> {
        Ok(self.lock()?.news.iter().find(|n| n.id == id).cloned())
    }
}
