//! Stuck-job reaper.
//!
//! Recovers jobs whose worker crashed, was killed, or lost connectivity
//! mid-processing without writing a terminal state. Runs on a fixed
//! interval, independent of any worker's lifetime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{error, info, warn};

use vframe_models::JobStatus;
use vframe_store::{JobStore, StoreError, StoreResult};

/// Message recorded on jobs the reaper terminates.
const TIMEOUT_MESSAGE: &str = "processing timeout exceeded";

/// Result of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Jobs transitioned to `error`
    pub reaped: u32,
    /// Jobs whose missing start time was backfilled instead
    pub backfilled: u32,
}

/// Periodically scans for jobs stuck in `processing` past their budget and
/// force-transitions them to `error`.
pub struct StuckJobReaper {
    store: Arc<dyn JobStore>,
    max_processing_duration: Duration,
    sweep_interval: Duration,
    enabled: bool,
}

impl StuckJobReaper {
    /// Create a new reaper. Detection can be disabled via the
    /// `ENABLE_STUCK_JOB_REAPER` environment variable.
    pub fn new(
        store: Arc<dyn JobStore>,
        max_processing_duration: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let enabled = std::env::var("ENABLE_STUCK_JOB_REAPER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            store,
            max_processing_duration,
            sweep_interval,
            enabled,
        }
    }

    /// Start the background sweep loop.
    ///
    /// Runs indefinitely; spawn it as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Stuck-job reaper is disabled");
            return;
        }

        info!(
            "Starting stuck-job reaper (interval: {:?}, budget: {:?})",
            self.sweep_interval, self.max_processing_duration
        );

        let mut ticker = interval(self.sweep_interval);

        loop {
            ticker.tick().await;

            match self.sweep(Utc::now()).await {
                Ok(outcome) if outcome.reaped > 0 || outcome.backfilled > 0 => {
                    info!(
                        "Sweep complete: {} reaped, {} backfilled",
                        outcome.reaped, outcome.backfilled
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Sweep error: {}", e),
            }
        }
    }

    /// Run a single scan-and-fix pass with the caller's clock.
    ///
    /// A `processing` job whose start time is older than `now - budget` is
    /// transitioned to `error` with `processing_completed_at = now`. A
    /// `processing` job with no start time at all (older-schema data) gets
    /// its start time backfilled from `created_at`, deferring timeout
    /// detection to the next sweep. Re-sweeping a job another pass already
    /// terminated is a no-op.
    pub async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<SweepOutcome> {
        let budget = chrono::Duration::from_std(self.max_processing_duration)
            .unwrap_or_else(|_| chrono::Duration::seconds(1800));
        let cutoff = now - budget;

        let mut outcome = SweepOutcome::default();

        for job in self.store.list_processing_jobs_older_than(cutoff).await? {
            match job.processing_started_at {
                None => {
                    self.store
                        .backfill_processing_started(&job.id, job.created_at)
                        .await?;
                    outcome.backfilled += 1;
                    warn!(
                        job_id = %job.id,
                        "Processing job had no start time; backfilled from creation time"
                    );
                }
                Some(started_at) => {
                    match self
                        .store
                        .transition(
                            &job.id,
                            JobStatus::Error,
                            Some(TIMEOUT_MESSAGE.to_string()),
                            now,
                        )
                        .await
                    {
                        Ok(_) => {
                            outcome.reaped += 1;
                            warn!(
                                job_id = %job.id,
                                started_at = %started_at,
                                "Reaped stuck job"
                            );
                        }
                        // Lost the race with a worker (or another sweep)
                        // writing a terminal state first.
                        Err(StoreError::InvalidTransition(_)) => {}
                        Err(e) => {
                            error!(job_id = %job.id, "Failed to reap stuck job: {}", e);
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }
}
