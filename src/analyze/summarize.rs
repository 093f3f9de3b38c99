//! Summary extraction and English→Chinese translation chain.
//!
//! Translation tries, in order: generative translation, machine translation,
//! glossary substitution. Capability failures only move the chain along.

use serde::Serialize;
use tracing::debug;

use super::ai_adapter::{Capabilities, DynGenerator, DynTranslator};
use super::glossary;
use super::text::is_non_target;
use crate::config::SummarizationConfig;
use crate::ingest::types::Article;
use crate::ingest::{clean_text, truncate_chars};

const PROMPT_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub original: String,
    pub translated: Option<String>,
}

pub struct Summarizer {
    max_length: usize,
    translate: bool,
    generator: Option<DynGenerator>,
    translator: Option<DynTranslator>,
}

impl Summarizer {
    pub fn new(cfg: &SummarizationConfig, caps: &Capabilities) -> Self {
        Self {
            max_length: cfg.max_length.max(1),
            translate: cfg.translate_to_chinese,
            generator: caps.generator.clone(),
            translator: caps.translator.clone(),
        }
    }

    pub async fn summarize(&self, article: &Article) -> Summary {
        let original = if article.content.trim().is_empty() {
            truncate_chars(&article.title, self.max_length)
        } else {
            match self.summarize_with_generator(article).await {
                Some(s) => s,
                None => self.extract_summary(&article.content),
            }
        };

        let translated = if self.translate && is_non_target(&original) {
            Some(self.translate_to_chinese(&original).await)
        } else {
            None
        };

        Summary {
            original,
            translated,
        }
    }

    /// `None` when translation is off or the title already reads as Chinese.
    pub async fn translate_title(&self, title: &str) -> Option<String> {
        if !self.translate || !is_non_target(title) {
            return None;
        }
        Some(self.translate_to_chinese(title).await)
    }

    /// First paragraph if it fits, otherwise a clipped prefix with an ellipsis.
    pub fn extract_summary(&self, content: &str) -> String {
        if let Some(first) = content.split("\n\n").next() {
            let first = clean_text(first);
            if !first.is_empty() && first.chars().count() <= self.max_length {
                return first;
            }
        }
        format!("{}...", truncate_chars(&clean_text(content), self.max_length))
    }

    async fn summarize_with_generator(&self, article: &Article) -> Option<String> {
        let g = self.generator.as_ref()?;
        let prompt = format!(
            "Write a concise summary (at most {max} characters) of this AI news item. \
             Keep technical terms accurate and lead with the key facts.\n\n\
             Title: {title}\nContent: {content}\n\nSummary:",
            max = self.max_length,
            title = article.title,
            content = truncate_chars(&article.content, PROMPT_CONTENT_CHARS),
        );
        let out = g.generate(&prompt, 150).await;
        if out.is_none() {
            debug!(title = %article.title, "generative summary unavailable");
        }
        out.map(|s| truncate_chars(s.trim(), self.max_length))
            .filter(|s| !s.is_empty())
    }

    async fn translate_to_chinese(&self, text: &str) -> String {
        if let Some(g) = &self.generator {
            let prompt = format!(
                "Translate this AI news text into concise Simplified Chinese, keeping \
                 technical terms accurate (at most {} characters):\n\n{text}\n\nTranslation:",
                self.max_length
            );
            match g.generate(&prompt, 200).await {
                Some(t) if !t.trim().is_empty() => {
                    return truncate_chars(t.trim(), self.max_length)
                }
                _ => debug!("generative translation unavailable"),
            }
        }

        if let Some(t) = &self.translator {
            match t.translate(text, "en", "zh-CN").await {
                Some(out) if !out.trim().is_empty() => {
                    return truncate_chars(out.trim(), self.max_length)
                }
                _ => debug!(provider = t.provider_name(), "machine translation unavailable"),
            }
        }

        let out = glossary::translate(text);
        if out == text {
            text.to_string()
        } else {
            truncate_chars(&out, self.max_length)
        }
    }
}
