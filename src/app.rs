// src/app.rs
//! Wiring: store, capabilities, pipeline, run gate, schedule, router.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinHandle;
use tracing::info;

use crate::analyze::build_capabilities;
use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::ingest::scheduler::{spawn_daily_scheduler, DailySchedule};
use crate::ingest::types::SourceAdapter;
use crate::pipeline::Pipeline;
use crate::runner::RunController;
use crate::store::{NewsStore, SqliteStore};

pub struct App {
    pub store: Arc<dyn NewsStore>,
    pub controller: Arc<RunController>,
    /// `None` when the scheduler is disabled.
    pub schedule: Option<DailySchedule>,
}

impl App {
    /// Open the configured SQLite database and wire everything around it.
    pub fn build(cfg: &AppConfig) -> Result<Self> {
        let store = SqliteStore::open(&cfg.database.path)
            .with_context(|| format!("opening database {}", cfg.database.path))?;
        Self::with_store(cfg, Arc::new(store), None)
    }

    /// `sources` replaces the configured adapters when given.
    pub fn with_store(
        cfg: &AppConfig,
        store: Arc<dyn NewsStore>,
        sources: Option<Vec<Box<dyn SourceAdapter>>>,
    ) -> Result<Self> {
        store.seed_categories().context("seeding categories")?;

        let caps = build_capabilities(&cfg.ai);
        let pipeline = Pipeline::from_config(cfg, store.clone(), &caps, sources);
        info!(sources = pipeline.source_count(), "pipeline ready");

        let schedule = if cfg.scheduler.enabled {
            Some(DailySchedule::from_config(&cfg.scheduler)?)
        } else {
            None
        };

        Ok(Self {
            store,
            controller: RunController::new(Arc::new(pipeline)),
            schedule,
        })
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            controller: self.controller.clone(),
            schedule: self.schedule,
        })
    }

    /// No-op when the scheduler is disabled.
    pub fn start_scheduler(&self) -> Option<JoinHandle<()>> {
        let schedule = self.schedule?;
        info!(
            time = %schedule.time.format("%H:%M"),
            tz = %schedule.tz,
            "daily scheduler enabled"
        );
        Some(spawn_daily_scheduler(schedule, self.controller.clone()))
    }
}
