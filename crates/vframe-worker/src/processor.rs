//! The processing worker.
//!
//! Drives one job end-to-end: claim, acquire source, extract frames,
//! persist them in sequence order, finalize. Failures after the claim are
//! captured into the job record; the worker never leaves a job stuck by
//! design (timeouts belong to the reaper).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use vframe_media::{FrameExtractor, MediaError};
use vframe_models::{Job, JobId, JobStatus};
use vframe_storage::FrameStore;
use vframe_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::source::SourceReader;

/// The handles a worker invocation needs, injected by whatever composes
/// the pipeline.
pub struct ProcessingContext {
    pub store: Arc<dyn JobStore>,
    pub frames: Arc<FrameStore>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub source: Arc<dyn SourceReader>,
    pub config: WorkerConfig,
}

/// Outcome of the extract-and-persist stage.
enum StageOutcome {
    /// Ran to the end; this many frames persisted
    Finished(u32),
    /// Job left `processing` under our feet; uploads stopped cooperatively
    Cancelled,
}

/// Claim one job and drive it to a terminal state.
///
/// Claim failures (`AlreadyProcessing`, `TimedOut`, unknown job) are
/// returned to the caller; every failure after the claim is recorded on the
/// job itself and `run` returns `Ok`.
pub async fn run(ctx: &ProcessingContext, job_id: &JobId) -> WorkerResult<()> {
    let job = claim(ctx, job_id).await?;

    let span = info_span!("process_job", job_id = %job.id);
    async {
        info!(source_ref = %job.source_ref, "Processing job");

        // Finalizing can lose a race with cancellation; when it does there
        // is nothing left for us to write, so the failure is only logged.
        match extract_and_persist(ctx, &job).await {
            Ok(StageOutcome::Finished(0)) => {
                finalize(
                    ctx,
                    job_id,
                    JobStatus::Error,
                    Some("no frames could be generated".to_string()),
                )
                .await;
                info!("Job finished with no persisted frames");
            }
            Ok(StageOutcome::Finished(count)) => {
                finalize(ctx, job_id, JobStatus::Completed, None).await;
                info!(frame_count = count, "Job completed");
            }
            Ok(StageOutcome::Cancelled) => {
                info!("Job cancelled during processing; uploads stopped");
            }
            Err(e) => {
                warn!("Job failed: {}", e);
                // The failure message lands on the record verbatim
                finalize(ctx, job_id, JobStatus::Error, Some(e.to_string())).await;
            }
        }

        Ok(())
    }
    .instrument(span)
    .await
}

/// Write a terminal state, tolerating a lost race with cancellation.
async fn finalize(
    ctx: &ProcessingContext,
    job_id: &JobId,
    status: JobStatus,
    error_message: Option<String>,
) {
    if let Err(e) = ctx
        .store
        .transition(job_id, status, error_message, Utc::now())
        .await
    {
        warn!("Could not finalize job as {}: {}", status, e);
    }
}

/// Claim the job, transitioning it to `processing`.
async fn claim(ctx: &ProcessingContext, job_id: &JobId) -> WorkerResult<Job> {
    let job = ctx.store.get_job(job_id).await?;

    match job.status {
        JobStatus::Pending => {}
        JobStatus::Processing => {
            // A stale claim means the previous worker is presumed dead; the
            // reaper owns that recovery, not us.
            let budget = chrono::Duration::from_std(ctx.config.max_processing_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800));
            let stale = job
                .processing_started_at
                .map(|started| Utc::now() - started > budget)
                .unwrap_or(false);
            return Err(if stale {
                WorkerError::TimedOut
            } else {
                WorkerError::AlreadyProcessing
            });
        }
        _ => return Err(WorkerError::AlreadyProcessing),
    }

    Ok(ctx
        .store
        .transition(job_id, JobStatus::Processing, None, Utc::now())
        .await?)
}

/// Fetch the source, run extraction, persist frames in sequence order.
async fn extract_and_persist(ctx: &ProcessingContext, job: &Job) -> WorkerResult<StageOutcome> {
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("job-{}-", job.id))
        .tempdir_in(ensure_work_root(ctx).await?)?;

    let video_path = ctx.source.fetch(&job.source_ref, work_dir.path()).await?;

    // Extraction completes fully before any upload starts. An empty yield
    // takes the same zero-persisted exit as all-uploads-failed.
    let frames_dir = work_dir.path().join("frames");
    let produced = match ctx.extractor.extract(&video_path, &frames_dir).await {
        Ok(produced) => produced,
        Err(MediaError::NoFramesProduced) => return Ok(StageOutcome::Finished(0)),
        Err(e) => return Err(e.into()),
    };

    persist_frames(ctx, job, produced).await
}

/// Upload produced frames one at a time in increasing sequence order.
///
/// A frame whose upload permanently fails is logged and skipped, leaving a
/// sequence gap; later frames are still attempted. Cancellation is checked
/// right before each upload and honored cooperatively.
async fn persist_frames(
    ctx: &ProcessingContext,
    job: &Job,
    produced: Vec<PathBuf>,
) -> WorkerResult<StageOutcome> {
    let mut persisted = 0u32;

    for (seq, path) in produced.iter().enumerate() {
        let seq = seq as u32;

        let current = ctx.store.get_job(&job.id).await?;
        if current.status != JobStatus::Processing {
            warn!(
                status = %current.status,
                "Job no longer processing; stopping frame uploads"
            );
            return Ok(StageOutcome::Cancelled);
        }

        let bytes = tokio::fs::read(path).await?;
        match ctx.frames.persist_frame(job, seq, bytes).await {
            Ok(_) => {
                persisted += 1;
                // Publish progress immediately so concurrent readers see
                // monotonic frame counts.
                ctx.store.set_frame_count(&job.id, persisted).await?;
            }
            Err(e) => {
                warn!(sequence_number = seq, "Skipping frame after failed upload: {}", e);
            }
        }
    }

    Ok(StageOutcome::Finished(persisted))
}

/// Make sure the configured work root exists.
async fn ensure_work_root(ctx: &ProcessingContext) -> WorkerResult<PathBuf> {
    let root = PathBuf::from(&ctx.config.work_dir);
    tokio::fs::create_dir_all(&root).await?;
    Ok(root)
}
