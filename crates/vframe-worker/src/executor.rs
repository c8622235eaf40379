//! Pending-job claim loop.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::WorkerResult;
use crate::processor::{run, ProcessingContext};

/// Claims pending jobs from the store and processes them, bounded by a
/// concurrency limit. Jobs run fully independently; the semaphore is the
/// only thing they share besides the store.
pub struct JobExecutor {
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(ctx: ProcessingContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);

        Self {
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
        }
    }

    /// Signal the claim loop to stop. In-flight jobs finish on their own;
    /// anything interrupted mid-processing is the reaper's to recover.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run the claim loop until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.ctx.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.ctx.config.claim_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.claim_batch().await {
                        warn!("Failed to claim pending jobs: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Claim up to the free concurrency slots' worth of pending jobs and
    /// spawn a worker per job.
    async fn claim_batch(&self) -> WorkerResult<()> {
        let free = self.job_semaphore.available_permits();
        if free == 0 {
            return Ok(());
        }

        let pending = self.ctx.store.list_pending_jobs(free).await?;
        for job in pending {
            let Ok(permit) = Arc::clone(&self.job_semaphore).acquire_owned().await else {
                break;
            };
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let _permit = permit;
                match run(&ctx, &job.id).await {
                    Ok(()) => {}
                    // Someone else got there first; nothing to do.
                    Err(e) if e.is_claim_failure() => {}
                    Err(e) => error!(job_id = %job.id, "Worker error: {}", e),
                }
            });
        }

        Ok(())
    }
}
