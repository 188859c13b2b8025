//! Cron-driven reminder scheduler
//!
//! One schedule drives every sweep. A run executes the jobs in
//! [`SweepJob::ALL`] order and completes before the next tick is computed.

pub mod jobs;
pub mod plan;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::util::Clock;

pub use jobs::{SweepJob, SweepReport, SweepRunner};

pub const DEFAULT_CRON_SCHEDULE: &str = "0 0 * * *";

/// Parse a cron expression.
///
/// Accepts the classic five fields (`m h dom mon dow`) as well as the
/// six/seven-field form with seconds (and year).
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expr}"))
    } else {
        Schedule::from_str(expr)
    }
}

pub struct ReminderScheduler {
    runner: SweepRunner,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReminderScheduler {
    pub fn new(runner: SweepRunner, schedule: Schedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            runner,
            schedule,
            clock,
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawn the schedule loop; calling it twice is a no-op
    pub fn start(&mut self) {
        if self.handle.is_some() {
            tracing::warn!("Reminder scheduler already running");
            return;
        }
        let runner = self.runner.clone();
        let schedule = self.schedule.clone();
        let clock = self.clock.clone();
        let shutdown = self.shutdown.clone();
        self.handle = Some(tokio::spawn(run_loop(runner, schedule, clock, shutdown)));
        tracing::info!(schedule = %self.schedule, "Reminder scheduler started");
    }

    /// Cancel the loop and wait for it; a sweep in progress finishes first
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shutdown.cancel();
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reminder scheduler task failed");
        }
        self.shutdown = CancellationToken::new();
        tracing::info!("Reminder scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Execute every job once, in order, as of `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<SweepReport> {
        self.runner.run_all(now).await
    }
}

async fn run_loop(
    runner: SweepRunner,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) {
    loop {
        let now = clock.now();
        let Some(next) = schedule.after(&now).next() else {
            tracing::warn!("Cron schedule has no upcoming run, scheduler exiting");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next = %next, "Next sweep scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Reminder scheduler received shutdown signal");
                return;
            }
        }

        let reports = runner.run_all(clock.now()).await;
        let failed: usize = reports.iter().map(|r| r.failed).sum();
        let aborted = reports.iter().filter(|r| r.error.is_some()).count();
        tracing::info!(jobs = reports.len(), failed, aborted, "Scheduled sweep run finished");
    }
}
