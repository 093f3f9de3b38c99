// src/api.rs
//! Admin HTTP surface: health, manual trigger, run status.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::ingest::scheduler::DailySchedule;
use crate::runner::{RunController, RunState, TriggerOutcome};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
    /// `None` when the scheduler is disabled.
    pub schedule: Option<DailySchedule>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape/trigger", post(trigger))
        .route("/scrape/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "ok" })
}

#[derive(Serialize)]
struct TriggerResp {
    success: bool,
    message: &'static str,
}

async fn trigger(State(state): State<AppState>) -> Json<TriggerResp> {
    let resp = match state.controller.trigger_run() {
        TriggerOutcome::Accepted => TriggerResp {
            success: true,
            message: "scrape started; poll /scrape/status for progress",
        },
        TriggerOutcome::Busy => TriggerResp {
            success: false,
            message: "a scrape is already running; check /scrape/status later",
        },
    };
    Json(resp)
}

#[derive(Serialize)]
struct StatusResp {
    status: RunState,
    last_run: Option<DateTime<Utc>>,
    saved_count: usize,
    error: Option<String>,
    next_run: Option<DateTime<Utc>>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    let s = state.controller.status();
    Json(StatusResp {
        status: s.status,
        last_run: s.last_run,
        saved_count: s.saved_count,
        error: s.error,
        next_run: state.schedule.map(|d| d.next_fire_after(Utc::now())),
    })
}
