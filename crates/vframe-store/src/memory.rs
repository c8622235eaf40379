//! In-memory job store.
//!
//! The reference implementation of `JobStore` for single-node deployments
//! and tests. A relational backend implements the same trait in production.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use vframe_models::{Frame, FrameId, Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

#[derive(Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    frames: HashMap<FrameId, Frame>,
}

/// In-memory `JobStore` over a `tokio::sync::RwLock`.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: Job) -> StoreResult<()> {
        let mut tables = self.inner.write().await;
        debug!(job_id = %job.id, "inserting job");
        tables.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
        let tables = self.inner.read().await;
        tables
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))
    }

    async fn transition(
        &self,
        id: &JobId,
        next: JobStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Job> {
        let mut tables = self.inner.write().await;
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;

        job.apply_transition(next, error_message, now)?;
        debug!(job_id = %id, status = %next, "job transitioned");
        Ok(job.clone())
    }

    async fn set_frame_count(&self, id: &JobId, frame_count: u32) -> StoreResult<()> {
        let mut tables = self.inner.write().await;
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;
        job.frame_count = frame_count;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn backfill_processing_started(
        &self,
        id: &JobId,
        started_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.inner.write().await;
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;
        if job.processing_started_at.is_none() {
            job.processing_started_at = Some(started_at);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_frame(&self, frame: Frame) -> StoreResult<()> {
        let mut tables = self.inner.write().await;

        // Upsert on (job_id, sequence_number): a retried persist replaces
        // the earlier record instead of duplicating it.
        let existing = tables
            .frames
            .values()
            .find(|f| f.job_id == frame.job_id && f.sequence_number == frame.sequence_number)
            .map(|f| f.id.clone());
        if let Some(id) = existing {
            tables.frames.remove(&id);
        }

        tables.frames.insert(frame.id.clone(), frame);
        Ok(())
    }

    async fn list_frames(&self, job_id: &JobId) -> StoreResult<Vec<Frame>> {
        let tables = self.inner.read().await;
        let mut frames: Vec<Frame> = tables
            .frames
            .values()
            .filter(|f| &f.job_id == job_id)
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.sequence_number);
        Ok(frames)
    }

    async fn delete_frame(&self, id: &FrameId) -> StoreResult<Frame> {
        let mut tables = self.inner.write().await;
        tables
            .frames
            .remove(id)
            .ok_or_else(|| StoreError::not_found(format!("frame {id}")))
    }

    async fn delete_job(&self, id: &JobId) -> StoreResult<Vec<Frame>> {
        let mut tables = self.inner.write().await;
        tables
            .jobs
            .remove(id)
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;

        let orphaned: Vec<FrameId> = tables
            .frames
            .values()
            .filter(|f| &f.job_id == id)
            .map(|f| f.id.clone())
            .collect();
        let mut deleted = Vec::with_capacity(orphaned.len());
        for frame_id in orphaned {
            if let Some(frame) = tables.frames.remove(&frame_id) {
                deleted.push(frame);
            }
        }
        deleted.sort_by_key(|f| f.sequence_number);
        debug!(job_id = %id, frames = deleted.len(), "deleted job and frames");
        Ok(deleted)
    }

    async fn list_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let tables = self.inner.read().await;
        let mut pending: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn list_processing_jobs_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<Job>> {
        let tables = self.inner.read().await;
        let stale: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Processing
                    && match j.processing_started_at {
                        Some(started) => started < cutoff,
                        None => true,
                    }
            })
            .cloned()
            .collect();
        Ok(stale)
    }
}
