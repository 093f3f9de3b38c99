//! Composite importance score.
//!
//! Four sub-scores, each clamped to [0,1] before weighting:
//! - keyword : high-priority hits × 0.3 (cap 0.6) + medium hits × 0.1 (cap 0.3)
//! - source  : caller-supplied trust weight
//! - length  : content chars / 1000
//! - recency : 1 − whole_days_old / 7, floor 0; 0.5 when the date is unknown
//!
//! The weighted sum is clamped to [0,1] and rounded to 3 decimals.

use chrono::{DateTime, Utc};

use crate::config::{KeywordsConfig, ScoringWeights};
use crate::ingest::types::Article;

const HIGH_HIT: f64 = 0.3;
const HIGH_CAP: f64 = 0.6;
const MEDIUM_HIT: f64 = 0.1;
const MEDIUM_CAP: f64 = 0.3;
const UNKNOWN_RECENCY: f64 = 0.5;

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    high: Vec<String>,
    medium: Vec<String>,
}

impl Scorer {
    pub fn new(weights: ScoringWeights, keywords: &KeywordsConfig) -> Self {
        fn prep(list: &[String]) -> Vec<String> {
            list.iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        }
        Self {
            weights,
            high: prep(&keywords.high_priority),
            medium: prep(&keywords.medium_priority),
        }
    }

    pub fn keyword_score(&self, article: &Article) -> f64 {
        let text = format!("{} {}", article.title, article.content).to_lowercase();
        let high = self.high.iter().filter(|k| text.contains(k.as_str())).count() as f64;
        let medium = self.medium.iter().filter(|k| text.contains(k.as_str())).count() as f64;
        ((high * HIGH_HIT).min(HIGH_CAP) + (medium * MEDIUM_HIT).min(MEDIUM_CAP)).min(1.0)
    }

    pub fn length_score(article: &Article) -> f64 {
        (article.content.chars().count() as f64 / 1000.0).min(1.0)
    }

    pub fn recency_score(article: &Article, now: DateTime<Utc>) -> f64 {
        match article.published_at {
            Some(p) => {
                let days = (now - p).num_days() as f64;
                unit(1.0 - days / 7.0)
            }
            None => UNKNOWN_RECENCY,
        }
    }

    /// Always in [0,1]; a non-finite sum scores 0.
    pub fn score(&self, article: &Article, source_weight: f64, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        let sum = unit(self.keyword_score(article)) * w.keyword_weight
            + unit(source_weight) * w.source_weight
            + unit(Self::length_score(article)) * w.length_weight
            + unit(Self::recency_score(article, now)) * w.recency_weight;
        if !sum.is_finite() {
            return 0.0;
        }
        (sum.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
    }
}
