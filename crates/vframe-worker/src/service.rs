//! Service facade consumed by the API layer.
//!
//! Thin operations over the store and frame storage: submission, status
//! queries, cancellation, deletion, and on-demand sweeps. Routing and page
//! rendering live elsewhere; nothing here knows about HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use vframe_models::{Job, JobId, JobStatus};
use vframe_storage::FrameStore;
use vframe_store::JobStore;

use crate::error::WorkerResult;
use crate::reaper::{StuckJobReaper, SweepOutcome};

/// Job lifecycle operations exposed to callers outside the pipeline.
pub struct JobService {
    store: Arc<dyn JobStore>,
    frames: Arc<FrameStore>,
    max_processing_duration: Duration,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        frames: Arc<FrameStore>,
        max_processing_duration: Duration,
    ) -> Self {
        Self {
            store,
            frames,
            max_processing_duration,
        }
    }

    /// Create a new pending job for a submitted video.
    pub async fn submit_job(
        &self,
        project_id: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> WorkerResult<JobId> {
        let job = Job::new(project_id, source_ref);
        let id = job.id.clone();
        self.store.insert_job(job).await?;
        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Fetch a job's current state. Status readers observe monotonic
    /// progress: `frame_count` never decreases and status only moves
    /// forward through the graph.
    pub async fn get_job_status(&self, id: &JobId) -> WorkerResult<Job> {
        Ok(self.store.get_job(id).await?)
    }

    /// List a job's frames in display order.
    pub async fn list_frames(&self, id: &JobId) -> WorkerResult<Vec<vframe_models::Frame>> {
        Ok(self.store.list_frames(id).await?)
    }

    /// Cancel a pending or processing job.
    ///
    /// An in-flight worker notices the status change before its next frame
    /// upload and stops cooperatively; in-flight uploads may complete.
    pub async fn cancel_job(&self, id: &JobId) -> WorkerResult<Job> {
        let job = self
            .store
            .transition(id, JobStatus::Cancelled, None, Utc::now())
            .await?;
        info!(job_id = %id, "Job cancelled");
        Ok(job)
    }

    /// Delete a single frame record and its stored image bytes.
    pub async fn delete_frame(&self, id: &vframe_models::FrameId) -> WorkerResult<()> {
        let frame = self.store.delete_frame(id).await?;
        self.frames.delete_frame_objects(&[frame]).await?;
        info!(frame_id = %id, "Frame deleted");
        Ok(())
    }

    /// Delete a job, its frame records, and their stored image bytes.
    pub async fn delete_job(&self, id: &JobId) -> WorkerResult<()> {
        let frames = self.store.delete_job(id).await?;
        let count = frames.len();
        self.frames.delete_frame_objects(&frames).await?;
        info!(job_id = %id, frames = count, "Job deleted");
        Ok(())
    }

    /// Run one stuck-job sweep now. Normally invoked on a timer, exposed
    /// for cron-style external triggers.
    pub async fn sweep_stuck_jobs(&self) -> WorkerResult<SweepOutcome> {
        let reaper = StuckJobReaper::new(
            Arc::clone(&self.store),
            self.max_processing_duration,
            Duration::from_secs(60),
        );
        Ok(reaper.sweep(Utc::now()).await?)
    }
}
