//! Soft duplicate filter: exact normalized URL, then fuzzy title similarity
//! against a rolling window of stored News.
//!
//! The store's unique URL constraint is the only hard guarantee; this filter
//! just keeps obvious repeats out of the enrichment stages.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tracing::{debug, warn};

use crate::config::{DedupConfig, MAX_DEDUP_WINDOW_DAYS};
use crate::ingest::normalize_url;
use crate::ingest::types::Article;
use crate::store::{NewsStore, StoreError};

/// Symmetric, case-insensitive similarity ratio in [0,1].
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Built once per run; the window titles are loaded up front and articles
/// accepted during the run are added to it.
pub struct Deduplicator<'a> {
    store: &'a dyn NewsStore,
    threshold: f64,
    window_titles: Vec<String>,
    seen_urls: HashSet<String>,
}

impl<'a> Deduplicator<'a> {
    pub fn load(
        store: &'a dyn NewsStore,
        cfg: DedupConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let since = now - Duration::days(cfg.window_days.clamp(1, MAX_DEDUP_WINDOW_DAYS));
        let window_titles = store
            .titles_since(since)?
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>();
        debug!(titles = window_titles.len(), "dedup window loaded");
        Ok(Self {
            store,
            threshold: cfg.similarity_threshold,
            window_titles,
            seen_urls: HashSet::new(),
        })
    }

    /// Articles with an empty URL or title are never duplicates here.
    pub fn is_duplicate(&self, article: &Article) -> bool {
        if article.url.trim().is_empty() || article.title.trim().is_empty() {
            return false;
        }

        let url = normalize_url(&article.url);
        if self.seen_urls.contains(&url) {
            debug!(url = %url, "duplicate url within run");
            return true;
        }
        match self.store.url_exists(&url) {
            Ok(true) => {
                debug!(url = %url, "duplicate url");
                return true;
            }
            Ok(false) => {}
            Err(e) => warn!(url = %url, error = %e, "url lookup failed; treating as new"),
        }

        let title = article.title.to_lowercase();
        if let Some(hit) = self
            .window_titles
            .iter()
            .find(|t| strsim::normalized_levenshtein(&title, t) >= self.threshold)
        {
            debug!(title = %article.title, similar_to = %hit, "duplicate title");
            return true;
        }
        false
    }

    /// Order-preserving; survivors join the in-run window.
    pub fn filter_duplicates(&mut self, articles: Vec<Article>) -> Vec<Article> {
        let mut out = Vec::with_capacity(articles.len());
        for a in articles {
            if self.is_duplicate(&a) {
                counter!("ainews_duplicates_total").increment(1);
                continue;
            }
            if !a.url.trim().is_empty() {
                self.seen_urls.insert(normalize_url(&a.url));
            }
            if !a.title.trim().is_empty() {
                self.window_titles.push(a.title.to_lowercase());
            }
            out.push(a);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_symmetric_and_case_blind() {
        let a = "OpenAI Releases GPT-5";
        let b = "openai releases gpt-5!";
        assert!((title_similarity(a, b) - title_similarity(b, a)).abs() < 1e-12);
        assert!(title_similarity(a, b) > 0.9);
        assert_eq!(title_similarity("", b), 0.0);
    }
}
