// src/runner.rs
//! Process-wide run gate. Manual triggers and the scheduler both go through
//! `RunController`, so at most one pipeline run is ever in flight.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::pipeline::{Pipeline, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub status: RunState,
    /// Start time of the latest run.
    pub last_run: Option<DateTime<Utc>>,
    /// News saved by the latest finished run.
    pub saved_count: usize,
    pub error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            status: RunState::Idle,
            last_run: None,
            saved_count: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    Accepted,
    Busy,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    Busy,
    #[error("run failed: {0}")]
    Failed(String),
}

pub struct RunController {
    pipeline: Arc<Pipeline>,
    status: Mutex<RunStatus>,
}

impl RunController {
    pub fn new(pipeline: Arc<Pipeline>) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            status: Mutex::new(RunStatus::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn status(&self) -> RunStatus {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().status == RunState::Running
    }

    /// Flip to `running` unless a run is already in flight.
    fn try_begin(&self) -> bool {
        let mut g = self.lock();
        if g.status == RunState::Running {
            return false;
        }
        g.status = RunState::Running;
        g.last_run = Some(Utc::now());
        g.saved_count = 0;
        g.error = None;
        true
    }

    fn finish(&self, result: &anyhow::Result<RunReport>) {
        let mut g = self.lock();
        match result {
            Ok(report) => {
                g.status = RunState::Completed;
                g.saved_count = report.saved;
                g.error = None;
            }
            Err(e) => {
                g.status = RunState::Failed;
                g.error = Some(format!("{e:#}"));
            }
        }
    }

    async fn execute(&self) -> anyhow::Result<RunReport> {
        // The run gets its own task so a panic surfaces as a JoinError
        // instead of leaving the status stuck at `running`.
        let pipeline = Arc::clone(&self.pipeline);
        let result = match tokio::spawn(async move { pipeline.run().await }).await {
            Ok(r) => r,
            Err(e) if e.is_panic() => Err(anyhow!("run panicked: {}", panic_message(e.into_panic()))),
            Err(e) => Err(anyhow!("run aborted: {e}")),
        };
        match &result {
            Ok(r) => info!(saved = r.saved, featured = r.featured, "run completed"),
            Err(e) => error!(error = %format!("{e:#}"), "run failed"),
        }
        self.finish(&result);
        result
    }

    /// Fire-and-forget. Never queues: a second trigger during a run is `Busy`.
    pub fn trigger_run(self: &Arc<Self>) -> TriggerOutcome {
        if !self.try_begin() {
            info!("manual trigger rejected: run in progress");
            return TriggerOutcome::Busy;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = this.execute().await;
        });
        TriggerOutcome::Accepted
    }

    /// Run in the caller's task through the same gate.
    pub async fn run_now(&self) -> Result<RunReport, RunError> {
        if !self.try_begin() {
            return Err(RunError::Busy);
        }
        self.execute()
            .await
            .map_err(|e| RunError::Failed(format!("{e:#}")))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
