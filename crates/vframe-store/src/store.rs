//! The persistence contract for jobs and frames.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vframe_models::{Frame, FrameId, Job, JobId, JobStatus};

use crate::error::StoreResult;

/// Persistence contract for jobs and frames.
///
/// The store is the single source of truth for job state; status transitions
/// through `transition` are the only "lock" the pipeline uses. Updates are
/// last-write-wins on distinct fields.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a newly created job.
    async fn insert_job(&self, job: Job) -> StoreResult<()>;

    /// Fetch a job by ID. Fails with `NotFound` for unknown IDs.
    async fn get_job(&self, id: &JobId) -> StoreResult<Job>;

    /// Move a job along one edge of the status graph, stamping timestamps.
    ///
    /// This is the only writer of `status`. Fails with `InvalidTransition`
    /// if `next` is not reachable from the job's current status, leaving the
    /// record unchanged; `error_message` is recorded only when `next` is
    /// `error`. `now` is the caller's clock so a reaper sweep stamps
    /// `processing_completed_at` with its own observation time.
    async fn transition(
        &self,
        id: &JobId,
        next: JobStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Job>;

    /// Publish in-flight progress. Monotonically non-decreasing while the
    /// job is processing.
    async fn set_frame_count(&self, id: &JobId, frame_count: u32) -> StoreResult<()>;

    /// Set `processing_started_at` on a job that is missing one (data
    /// migrated from an older schema). No-op if the field is already set.
    async fn backfill_processing_started(
        &self,
        id: &JobId,
        started_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Insert a frame record, upserting on `(job_id, sequence_number)` so a
    /// retried persist yields exactly one record.
    async fn insert_frame(&self, frame: Frame) -> StoreResult<()>;

    /// List a job's frames ordered by `sequence_number`.
    async fn list_frames(&self, job_id: &JobId) -> StoreResult<Vec<Frame>>;

    /// Delete a single frame record, returning it so the caller can remove
    /// its stored bytes.
    async fn delete_frame(&self, id: &FrameId) -> StoreResult<Frame>;

    /// Delete a job and all of its frame records. Returns the deleted frames
    /// so the caller can remove their stored bytes.
    async fn delete_job(&self, id: &JobId) -> StoreResult<Vec<Frame>>;

    /// List pending jobs, oldest first, for the claim loop.
    async fn list_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>>;

    /// List `processing` jobs whose `processing_started_at` is older than
    /// `cutoff`, including jobs with no start time at all (so the reaper can
    /// backfill them).
    async fn list_processing_jobs_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<Job>>;
}
