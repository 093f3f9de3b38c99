// src/ingest/scheduler.rs
//! Once-a-day trigger at a local wall-clock time in an IANA timezone.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::runner::{RunController, RunError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    pub time: NaiveTime,
    pub tz: Tz,
}

impl DailySchedule {
    pub fn from_config(cfg: &SchedulerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            time: cfg.daily_time()?,
            tz: cfg.tz()?,
        })
    }

    /// First firing instant strictly after `now`.
    ///
    /// A wall-clock time skipped by a DST jump fires one hour later; a repeated
    /// one fires at its first occurrence.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        for offset in 0..=2 {
            let day = today + Duration::days(offset);
            let at = self.resolve(day.and_time(self.time));
            if let Some(at) = at {
                if at > now {
                    return at;
                }
            }
        }
        now + Duration::days(1)
    }

    fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Sleep until the next firing time, run through the shared gate, repeat.
/// A run already in flight at firing time is skipped, not queued.
pub fn spawn_daily_scheduler(schedule: DailySchedule, controller: Arc<RunController>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_fire: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            let from = match last_fire {
                Some(f) if f + Duration::seconds(1) > now => f + Duration::seconds(1),
                _ => now,
            };
            let next = schedule.next_fire_after(from);
            tracing::info!(next_run = %next, tz = %schedule.tz, "scheduler armed");

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            last_fire = Some(next);

            match controller.run_now().await {
                Ok(r) => tracing::info!(saved = r.saved, "scheduled run done"),
                Err(RunError::Busy) => tracing::info!("scheduled run skipped: run in progress"),
                Err(e) => tracing::error!(error = %e, "scheduled run failed"),
            }
        }
    })
}
