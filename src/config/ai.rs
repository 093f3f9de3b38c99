// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_daily_limit() -> u32 {
    200
}
fn default_cache_dir() -> String {
    "cache/ai".to_string()
}
fn yes() -> bool {
    true
}

/// Optional enrichment capabilities (generative text + machine translation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else disables generation.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Max real generative calls per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Use the public machine-translation endpoint as second translation strategy.
    #[serde(default = "yes")]
    pub machine_translation: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            api_key: default_api_key(),
            model: default_model(),
            daily_limit: default_daily_limit(),
            cache_dir: default_cache_dir(),
            machine_translation: true,
        }
    }
}

impl AiConfig {
    /// Normalize provider, apply env overrides, resolve the "ENV" key placeholder.
    /// A missing key does not fail: generation is switched off instead.
    pub fn resolve(&mut self) {
        self.provider = self.provider.trim().to_lowercase();

        if let Ok(v) = env::var("AI_ENABLED") {
            self.enabled = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Ok(m) = env::var("OPENAI_MODEL") {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            };
        }

        if self.enabled && self.api_key.is_empty() && !mock_mode() {
            tracing::warn!(provider = %self.provider, "AI enabled but no API key; generative capability disabled");
            self.enabled = false;
        }
    }
}

/// `AI_TEST_MODE=mock` swaps every capability for a deterministic mock.
pub fn mock_mode() -> bool {
    env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
}
