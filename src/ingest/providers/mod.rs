// src/ingest/providers/mod.rs
pub mod feed;
pub mod markup;

pub use feed::FeedAdapter;
pub use markup::{MarkupAdapter, MarkupSelectors};
