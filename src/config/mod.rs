// src/config/mod.rs
//! Application configuration: a TOML file plus environment overrides.
//!
//! Lookup order for the file:
//! 1) `$AINEWS_CONFIG_PATH` (must exist)
//! 2) `config/ainews.toml`
//! 3) built-in defaults (no sources)

pub mod ai;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::fetch::{FetchOptions, DEFAULT_USER_AGENT};
use crate::ingest::providers::MarkupSelectors;

pub use ai::AiConfig;

pub const ENV_CONFIG_PATH: &str = "AINEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/ainews.toml";
/// Upper bound for the dedup window.
pub const MAX_DEDUP_WINDOW_DAYS: i64 = 365;

fn yes() -> bool {
    true
}
fn default_source_weight() -> f64 {
    0.2
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub processing: ProcessingConfig,
    pub keywords: KeywordsConfig,
    pub scheduler: SchedulerConfig,
    pub fetch: FetchConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub rss: Vec<FeedSourceConfig>,
    pub web: Vec<WebSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "default_source_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "default_source_weight")]
    pub weight: f64,
    #[serde(default)]
    pub selectors: MarkupSelectors,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub scoring: ScoringWeights,
    pub summarization: SummarizationConfig,
    pub dedup: DedupConfig,
}

/// Weights of the four importance sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub keyword_weight: f64,
    pub source_weight: f64,
    pub length_weight: f64,
    pub recency_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_weight: 0.3,
            source_weight: 0.2,
            length_weight: 0.1,
            recency_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// In characters.
    pub max_length: usize,
    pub translate_to_chinese: bool,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            max_length: 200,
            translate_to_chinese: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub window_days: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    pub high_priority: Vec<String>,
    pub medium_priority: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Local wall-clock time, "HH:MM".
    pub daily_scrape_time: String,
    /// IANA zone name.
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_scrape_time: "09:00".into(),
            timezone: "Asia/Shanghai".into(),
        }
    }
}

impl SchedulerConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_scrape_time.trim(), "%H:%M")
            .with_context(|| format!("daily_scrape_time `{}` is not HH:MM", self.daily_scrape_time))
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone `{}`: {e}", self.timezone))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub feed_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub user_agent: String,
    /// Hosts fetched with certificate validation disabled. Recovery aid only.
    pub relaxed_tls_domains: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            feed_timeout_secs: 15,
            page_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.into(),
            relaxed_tls_domains: vec!["jiqizhixin.com".into(), "anthropic.com".into()],
        }
    }
}

impl FetchConfig {
    pub fn feed_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.feed_timeout_secs.max(1)),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn page_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.page_timeout_secs.max(1)),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/ainews.db".into(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, then apply env overrides and validation.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.finish()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::warn!("no config file found; using built-in defaults");
        let mut cfg = AppConfig::default();
        cfg.finish()?;
        Ok(cfg)
    }

    fn finish(&mut self) -> Result<()> {
        self.apply_env_overrides();
        self.ai.resolve();
        self.sanitize();
        self.validate()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(p) = std::env::var("AINEWS_DB_PATH") {
            self.database.path = p;
        }
        if let Ok(v) = std::env::var("AINEWS_SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_flag(&v);
        }
        if let Ok(v) = std::env::var("AINEWS_DAILY_SCRAPE_TIME") {
            self.scheduler.daily_scrape_time = v;
        }
        if let Ok(v) = std::env::var("AINEWS_TIMEZONE") {
            self.scheduler.timezone = v;
        }
        if let Ok(v) = std::env::var("AINEWS_TRANSLATE") {
            self.processing.summarization.translate_to_chinese = parse_flag(&v);
        }
    }

    /// Out-of-range numbers are repaired rather than rejected.
    fn sanitize(&mut self) {
        let d = ScoringWeights::default();
        let w = &mut self.processing.scoring;
        for (v, dv) in [
            (&mut w.keyword_weight, d.keyword_weight),
            (&mut w.source_weight, d.source_weight),
            (&mut w.length_weight, d.length_weight),
            (&mut w.recency_weight, d.recency_weight),
        ] {
            if !v.is_finite() {
                *v = dv;
            }
        }

        let dd = &mut self.processing.dedup;
        if !dd.similarity_threshold.is_finite() {
            dd.similarity_threshold = DedupConfig::default().similarity_threshold;
        }
        dd.similarity_threshold = dd.similarity_threshold.clamp(0.0, 1.0);
        if dd.window_days < 1 {
            dd.window_days = DedupConfig::default().window_days;
        }
        dd.window_days = dd.window_days.min(MAX_DEDUP_WINDOW_DAYS);

        let s = &mut self.processing.summarization;
        if s.max_length == 0 {
            s.max_length = SummarizationConfig::default().max_length;
        }

        for src in &mut self.sources.rss {
            src.weight = clamp_weight(src.weight);
        }
        for src in &mut self.sources.web {
            src.weight = clamp_weight(src.weight);
        }
    }

    fn validate(&self) -> Result<()> {
        self.scheduler.daily_time()?;
        self.scheduler.tz()?;
        for (name, url) in self
            .sources
            .rss
            .iter()
            .map(|s| (&s.name, &s.url))
            .chain(self.sources.web.iter().map(|s| (&s.name, &s.url)))
        {
            if name.trim().is_empty() {
                bail!("source with url `{url}` has an empty name");
            }
            url::Url::parse(url).with_context(|| format!("source `{name}` has invalid url"))?;
        }
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn clamp_weight(w: f64) -> f64 {
    if w.is_finite() {
        w.clamp(0.0, 1.0)
    } else {
        default_source_weight()
    }
}
