//! Enrichment capabilities: generative text and machine translation.
//!
//! Every capability is best-effort. Callers get `Option<String>` and move on to
//! the next strategy on `None`; nothing here returns an error to the pipeline.
//! Real generative calls go through a file cache plus a per-day call limit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ai::{mock_mode, AiConfig};
use crate::ingest::truncate_chars;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Option<String>;
    fn provider_name(&self) -> &'static str;
}

/// Text plus source/target language codes in, translated text out.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Option<String>;
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;
pub type DynTranslator = Arc<dyn Translator>;

/// The optional capabilities handed to the classifier and summarizer.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub generator: Option<DynGenerator>,
    pub translator: Option<DynTranslator>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Factory: build capabilities according to config and environment.
///
/// * `AI_TEST_MODE=mock` yields deterministic mocks for both.
/// * Generation requires `ai.enabled` and provider `openai` with a key.
/// * Machine translation follows `ai.machine_translation`.
pub fn build_capabilities(cfg: &AiConfig) -> Capabilities {
    let cache_dir = PathBuf::from(&cfg.cache_dir);

    if mock_mode() {
        let mock = MockProvider {
            fixed: "Mock summary.".to_string(),
        };
        return Capabilities {
            generator: Some(Arc::new(CachingGenerator::new(
                mock,
                cache_dir,
                cfg.daily_limit,
            ))),
            translator: Some(Arc::new(MockTranslator)),
        };
    }

    let generator: Option<DynGenerator> = if cfg.enabled {
        match cfg.provider.as_str() {
            "openai" => match OpenAiProvider::new(&cfg.api_key, &cfg.model) {
                Ok(p) => Some(Arc::new(CachingGenerator::new(p, cache_dir, cfg.daily_limit))),
                Err(e) => {
                    tracing::warn!(error = %e, "could not build OpenAI client; generation disabled");
                    None
                }
            },
            other => {
                tracing::warn!(provider = %other, "unsupported AI provider; generation disabled");
                None
            }
        }
    } else {
        None
    };

    let translator: Option<DynTranslator> = if cfg.machine_translation {
        match GoogleTranslator::new() {
            Ok(t) => Some(Arc::new(t)),
            Err(e) => {
                tracing::warn!(error = %e, "could not build translation client");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(
        generator = generator.as_ref().map(|g| g.provider_name()).unwrap_or("none"),
        translator = translator.as_ref().map(|t| t.provider_name()).unwrap_or("none"),
        "enrichment capabilities ready"
    );

    Capabilities {
        generator,
        translator,
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider doing the real remote call; wrapped by `CachingGenerator`.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Option<String>;
    fn name(&self) -> &'static str;
}

/// OpenAI Chat Completions.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ainews/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
            max_tokens,
        };

        let resp = match self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "openai request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "openai returned non-success");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let text = body.choices.first()?.message.content.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Fixed-answer provider for tests and local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Option<String> {
        Some(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Public Google endpoint (`client=gtx`), no key required.
pub struct GoogleTranslator {
    http: reqwest::Client,
}

/// The endpoint rejects long inputs.
pub const MAX_TRANSLATE_CHARS: usize = 4500;

impl GoogleTranslator {
    pub fn new() -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Option<String> {
        let q = truncate_chars(text, MAX_TRANSLATE_CHARS);
        let url = url::Url::parse_with_params(
            "https://translate.googleapis.com/translate_a/single",
            &[
                ("client", "gtx"),
                ("sl", from),
                ("tl", to),
                ("dt", "t"),
                ("q", q.as_str()),
            ],
        )
        .ok()?;

        let resp = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "machine translation request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "machine translation non-success");
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        parse_gtx_response(&body)
    }

    fn provider_name(&self) -> &'static str {
        "google-gtx"
    }
}

/// The response is `[[["translated", "source", ...], ...], ...]`; segments are concatenated.
pub fn parse_gtx_response(body: &serde_json::Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    let out: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
        .collect();
    let out = out.trim().to_string();
    (!out.is_empty()).then_some(out)
}

/// Deterministic translator: prefixes the target language.
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, _from: &str, to: &str) -> Option<String> {
        Some(format!("[{to}] {text}"))
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching generator (file cache + daily limit)
// ------------------------------------------------------------

pub struct CachingGenerator<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Mutex<DailyCounter>,
}

impl<P: Provider> CachingGenerator<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!(dir = %cache_dir.display(), error = %e, "cannot create AI cache dir");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    /// Real calls made today.
    pub fn calls_today(&self) -> u32 {
        self.counter
            .lock()
            .map(|mut g| {
                g.roll_over();
                g.count
            })
            .unwrap_or(0)
    }

    fn limit_reached(&self) -> bool {
        let Ok(mut g) = self.counter.lock() else {
            return true;
        };
        if g.roll_over() {
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        g.count >= self.daily_limit_max
    }

    fn record_call(&self) {
        if let Ok(mut g) = self.counter.lock() {
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
    }
}

#[async_trait]
impl<P: Provider> TextGenerator for CachingGenerator<P> {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Option<String> {
        // Cache hits do not count against the limit.
        let key = cache_key(self.inner.name(), prompt);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Some(hit.text);
        }

        if self.limit_reached() {
            tracing::debug!(limit = self.daily_limit_max, "daily AI limit reached");
            return None;
        }

        let fresh = self.inner.complete(prompt, max_tokens).await?;
        self.record_call();
        let entry = CacheEntry { text: fresh };
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &entry) {
            tracing::debug!(error = %e, "AI cache write failed");
        }
        Some(entry.text)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    text: String,
}

fn cache_key(provider: &str, prompt: &str) -> String {
    let mut h = Sha256::new();
    h.update(provider.as_bytes());
    h.update([0u8]);
    h.update(prompt.as_bytes());
    format!("{:x}", h.finalize())
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CacheEntry> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, json)?;
    fs::rename(tmp, path)
}

fn write_cache_file(dir: &Path, key: &str, value: &CacheEntry) -> io::Result<()> {
    write_json_atomic(&cache_path(dir, key), value)
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    /// Resets on a new UTC day; returns whether it did.
    fn roll_over(&mut self) -> bool {
        let t = today();
        if self.date != t {
            self.date = t;
            self.count = 0;
            true
        } else {
            false
        }
    }
}

fn today() -> String {
    Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    write_json_atomic(&counter_path(dir), dc)
}
