// src/analyze/mod.rs
//! Per-article enrichment stages: dedup, classification, scoring, summary.

pub mod ai_adapter;
pub mod classify;
pub mod dedup;
pub mod glossary;
pub mod scoring;
pub mod summarize;
pub mod text;

pub use ai_adapter::{build_capabilities, Capabilities, TextGenerator, Translator};
pub use classify::Classifier;
pub use dedup::Deduplicator;
pub use scoring::Scorer;
pub use summarize::{Summarizer, Summary};
