// src/pipeline.rs
//! One end-to-end ingestion run: scrape → dedup → enrich → persist → featured pass.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use crate::analyze::text::{extract_keywords, language_tag, MAX_KEYWORDS};
use crate::analyze::{Capabilities, Classifier, Deduplicator, Scorer, Summarizer};
use crate::config::{AppConfig, DedupConfig};
use crate::ingest::normalize_url;
use crate::ingest::providers::{FeedAdapter, MarkupAdapter};
use crate::ingest::types::{Article, SourceAdapter, SourceDescriptor, SourceKind};
use crate::store::{Category, NewNews, NewsStore, Source, StoreError};

/// The featured pass always looks at the trailing week.
pub const FEATURED_WINDOW_DAYS: i64 = 7;

/// Top tenth, at least one, none for an empty set.
pub fn featured_count(eligible: usize) -> usize {
    if eligible == 0 {
        0
    } else {
        (eligible / 10).max(1)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub scraped: usize,
    pub duplicates: usize,
    pub saved: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunReport {
    pub scraped: usize,
    pub duplicates: usize,
    pub saved: usize,
    pub skipped: usize,
    pub featured: usize,
    pub sources: Vec<SourceReport>,
}

/// Enabled sources in configured order: feeds first, then pages.
pub fn build_adapters(cfg: &AppConfig) -> Vec<Box<dyn SourceAdapter>> {
    let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for s in cfg.sources.rss.iter().filter(|s| s.enabled) {
        let desc = SourceDescriptor {
            name: s.name.clone(),
            url: s.url.clone(),
            kind: SourceKind::Rss,
            weight: s.weight,
        };
        out.push(Box::new(FeedAdapter::from_url(
            desc,
            cfg.fetch.feed_options(),
            cfg.fetch.relaxed_tls_domains.clone(),
        )));
    }
    for s in cfg.sources.web.iter().filter(|s| s.enabled) {
        let desc = SourceDescriptor {
            name: s.name.clone(),
            url: s.url.clone(),
            kind: SourceKind::Web,
            weight: s.weight,
        };
        out.push(Box::new(MarkupAdapter::from_url(
            desc,
            s.selectors.clone(),
            cfg.fetch.page_options(),
        )));
    }
    out
}

pub struct Pipeline {
    store: Arc<dyn NewsStore>,
    sources: Vec<Box<dyn SourceAdapter>>,
    classifier: Classifier,
    summarizer: Summarizer,
    scorer: Scorer,
    dedup: DedupConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        sources: Vec<Box<dyn SourceAdapter>>,
        classifier: Classifier,
        summarizer: Summarizer,
        scorer: Scorer,
        dedup: DedupConfig,
    ) -> Self {
        Self {
            store,
            sources,
            classifier,
            summarizer,
            scorer,
            dedup,
        }
    }

    /// Wire every stage from config. `sources` overrides the configured
    /// adapters when given (fixtures, offline runs).
    pub fn from_config(
        cfg: &AppConfig,
        store: Arc<dyn NewsStore>,
        caps: &Capabilities,
        sources: Option<Vec<Box<dyn SourceAdapter>>>,
    ) -> Self {
        let sources = sources.unwrap_or_else(|| build_adapters(cfg));
        Self::new(
            store,
            sources,
            Classifier::new(caps.generator.clone()),
            Summarizer::new(&cfg.processing.summarization, caps),
            Scorer::new(cfg.processing.scoring, &cfg.keywords),
            cfg.processing.dedup,
        )
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn run(&self) -> Result<RunReport> {
        counter!("ainews_runs_total").increment(1);
        let now = Utc::now();
        let mut report = RunReport::default();

        self.store
            .seed_categories()
            .context("seeding categories")?;
        let categories = self.category_ids()?;
        let mut dedup = Deduplicator::load(self.store.as_ref(), self.dedup, now)
            .context("loading dedup window")?;

        for adapter in &self.sources {
            let desc = adapter.descriptor();
            let mut sr = SourceReport {
                name: desc.name.clone(),
                ..Default::default()
            };

            let articles = adapter.scrape().await;
            sr.scraped = articles.len();
            let fresh = dedup.filter_duplicates(articles);
            sr.duplicates = sr.scraped - fresh.len();

            if !fresh.is_empty() {
                let source = self
                    .store
                    .find_or_create_source(&desc.name, &desc.url, desc.kind)
                    .with_context(|| format!("resolving source `{}`", desc.name))?;

                let mut batch = Vec::with_capacity(fresh.len());
                for a in &fresh {
                    batch.push(self.enrich(a, &source, desc.weight, &categories, now).await);
                }

                let outcome = self
                    .store
                    .insert_batch(&batch)
                    .with_context(|| format!("persisting batch for `{}`", desc.name))?;
                for (url, reason) in &outcome.skipped {
                    warn!(source = %desc.name, url = %url, reason = %reason, "article skipped at insert");
                }
                sr.saved = outcome.inserted.len();
                sr.skipped = outcome.skipped.len();
                counter!("ainews_news_saved_total").increment(sr.saved as u64);
                counter!("ainews_insert_conflicts_total").increment(sr.skipped as u64);
            }

            info!(
                source = %sr.name,
                scraped = sr.scraped,
                duplicates = sr.duplicates,
                saved = sr.saved,
                skipped = sr.skipped,
                "source processed"
            );
            report.scraped += sr.scraped;
            report.duplicates += sr.duplicates;
            report.saved += sr.saved;
            report.skipped += sr.skipped;
            report.sources.push(sr);
        }

        report.featured = self.mark_featured(now).context("featured pass")?;
        gauge!("ainews_last_run_ts").set(now.timestamp() as f64);

        info!(
            scraped = report.scraped,
            duplicates = report.duplicates,
            saved = report.saved,
            skipped = report.skipped,
            featured = report.featured,
            "run finished"
        );
        Ok(report)
    }

    /// Marks the top-scoring unfeatured News of the trailing week.
    pub fn mark_featured(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let since = now - Duration::days(FEATURED_WINDOW_DAYS);
        let mut eligible = self.store.unfeatured_since(since)?;
        let n = featured_count(eligible.len());
        if n == 0 {
            return Ok(0);
        }
        eligible.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));
        let ids: Vec<_> = eligible.iter().take(n).map(|s| s.id).collect();
        let changed = self.store.mark_featured(&ids)?;
        counter!("ainews_featured_total").increment(changed as u64);
        info!(eligible = eligible.len(), featured = changed, "featured pass done");
        Ok(changed)
    }

    fn category_ids(&self) -> Result<HashMap<Category, i64>> {
        let mut out = HashMap::new();
        for c in Category::ALL {
            if let Some(id) = self.store.category_id(c)? {
                out.insert(c, id);
            }
        }
        Ok(out)
    }

    async fn enrich(
        &self,
        a: &Article,
        source: &Source,
        source_weight: f64,
        categories: &HashMap<Category, i64>,
        now: DateTime<Utc>,
    ) -> NewNews {
        let category = self.classifier.classify(a).await;
        let summary = self.summarizer.summarize(a).await;
        let title_translated = self.summarizer.translate_title(&a.title).await;
        let importance_score = self.scorer.score(a, source_weight, now);
        let text = format!("{} {}", a.title, a.content);

        NewNews {
            title: a.title.clone(),
            title_translated,
            content: a.content.clone(),
            summary: summary.original,
            summary_translated: summary.translated,
            url: normalize_url(&a.url),
            image_url: a.image_url.clone(),
            author: a.author.clone(),
            source_id: source.id,
            category_id: categories.get(&category).copied(),
            published_at: a.published_at.unwrap_or(now),
            scraped_at: now,
            importance_score,
            keywords: extract_keywords(&text, MAX_KEYWORDS),
            language: language_tag(&text).to_string(),
            is_processed: true,
        }
    }
}
