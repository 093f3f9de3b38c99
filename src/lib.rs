// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod app;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod runner;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::ai_adapter;
pub use crate::api::create_router;
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::runner::{RunController, RunState, RunStatus, TriggerOutcome};
