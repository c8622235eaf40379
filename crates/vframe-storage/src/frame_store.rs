//! Frame store adapter.
//!
//! Persists extracted frame images to object storage at deterministic keys
//! and records them in the job store. Upload retries are safe because the
//! key is derived from `(job, sequence_number)` and puts overwrite.

use std::sync::Arc;

use tracing::{debug, info};

use vframe_models::{Frame, Job, JobId};
use vframe_store::JobStore;

use crate::client::ObjectStore;
use crate::error::{StorageError, StorageResult};
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Content type for extracted frame images.
const FRAME_CONTENT_TYPE: &str = "image/jpeg";

/// Object key for a frame, derivable from the job and sequence number alone.
pub fn frame_object_key(project_id: &str, job_id: &JobId, sequence_number: u32) -> String {
    format!("{project_id}/{job_id}/frame_{sequence_number}.jpg")
}

/// Uploads frame images and records their metadata.
pub struct FrameStore {
    objects: Arc<dyn ObjectStore>,
    store: Arc<dyn JobStore>,
    retry: RetryConfig,
}

impl FrameStore {
    /// Create a new frame store with the default upload retry policy
    /// (3 retries, 1s base backoff).
    pub fn new(objects: Arc<dyn ObjectStore>, store: Arc<dyn JobStore>) -> Self {
        Self {
            objects,
            store,
            retry: RetryConfig::new("frame_upload"),
        }
    }

    /// Override the upload retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Persist one frame: upload the bytes, then create the Frame record.
    ///
    /// The upload is retried under the configured policy. The record is
    /// inserted only after the bytes are durably stored; if record creation
    /// fails after a successful upload the frame still counts as failed, so
    /// success is never reported without a queryable record. Errors here are
    /// per-frame: the caller is expected to log, skip, and continue with
    /// later frames.
    pub async fn persist_frame(
        &self,
        job: &Job,
        sequence_number: u32,
        bytes: Vec<u8>,
    ) -> StorageResult<Frame> {
        let key = frame_object_key(&job.project_id, &job.id, sequence_number);
        debug!(job_id = %job.id, sequence_number, key = %key, "persisting frame");

        let result = retry_async(&self.retry, || {
            let bytes = bytes.clone();
            let key = key.clone();
            async move { self.objects.put(&key, bytes, FRAME_CONTENT_TYPE).await }
        })
        .await;

        match result {
            RetryResult::Success(()) => {}
            RetryResult::Failed { error, attempts } => {
                return Err(StorageError::upload_failed(error.to_string(), attempts));
            }
        }

        let frame = Frame::new(job.id.clone(), sequence_number, key);
        self.store.insert_frame(frame.clone()).await?;
        Ok(frame)
    }

    /// Delete the stored bytes for a set of frames (job-deletion cascade).
    ///
    /// Deletion is best-effort per object; the first failure is returned
    /// after attempting the rest.
    pub async fn delete_frame_objects(&self, frames: &[Frame]) -> StorageResult<u32> {
        let mut deleted = 0u32;
        let mut first_error: Option<StorageError> = None;

        for frame in frames {
            match self.objects.delete(&frame.storage_ref).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if deleted > 0 {
            info!("Deleted {} frame objects", deleted);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vframe_store::MemoryJobStore;

    use crate::client::MemoryObjectStore;

    fn fast_retry() -> RetryConfig {
        RetryConfig::new("frame_upload_test").with_base_delay(Duration::from_millis(1))
    }

    fn fixture() -> (Arc<MemoryObjectStore>, Arc<MemoryJobStore>, FrameStore, Job) {
        let objects = Arc::new(MemoryObjectStore::new());
        let store = Arc::new(MemoryJobStore::new());
        let frames = FrameStore::new(objects.clone(), store.clone()).with_retry(fast_retry());
        let job = Job::new("project-1", "videos/a.mp4");
        (objects, store, frames, job)
    }

    #[test]
    fn test_frame_object_key_layout() {
        let job_id = JobId::from_string("job-1");
        assert_eq!(
            frame_object_key("proj", &job_id, 7),
            "proj/job-1/frame_7.jpg"
        );
    }

    #[tokio::test]
    async fn test_persist_frame_uploads_then_records() {
        let (objects, store, frames, job) = fixture();
        store.insert_job(job.clone()).await.unwrap();

        let frame = frames
            .persist_frame(&job, 0, vec![0xFF, 0xD8])
            .await
            .unwrap();

        assert_eq!(frame.sequence_number, 0);
        assert!(objects.exists(&frame.storage_ref).await.unwrap());
        assert_eq!(store.list_frames(&job.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_frame_is_idempotent() {
        let (objects, store, frames, job) = fixture();
        store.insert_job(job.clone()).await.unwrap();

        frames.persist_frame(&job, 0, vec![1]).await.unwrap();
        frames.persist_frame(&job, 0, vec![2]).await.unwrap();

        // One object, one record; the second call overwrote the first
        assert_eq!(objects.len().await, 1);
        assert_eq!(store.list_frames(&job.id).await.unwrap().len(), 1);
        let key = frame_object_key(&job.project_id, &job.id, 0);
        assert_eq!(objects.get(&key).await, Some(vec![2]));
    }

    #[tokio::test]
    async fn test_persist_frame_retries_transient_failures() {
        let (objects, store, frames, job) = fixture();
        store.insert_job(job.clone()).await.unwrap();

        let key = frame_object_key(&job.project_id, &job.id, 0);
        objects.fail_next_puts(&key, 2).await;

        frames.persist_frame(&job, 0, vec![1]).await.unwrap();
        assert_eq!(objects.put_calls(&key).await, 3);
    }

    #[tokio::test]
    async fn test_persist_frame_exhausts_retries() {
        let (objects, store, frames, job) = fixture();
        store.insert_job(job.clone()).await.unwrap();

        let key = frame_object_key(&job.project_id, &job.id, 0);
        objects.fail_next_puts(&key, 10).await;

        let err = frames.persist_frame(&job, 0, vec![1]).await.unwrap_err();
        match err {
            StorageError::UploadFailed { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.list_frames(&job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_counts_as_frame_failure() {
        use async_trait::async_trait;
        use chrono::{DateTime, Utc};
        use vframe_models::{FrameId, JobStatus};
        use vframe_store::{StoreError, StoreResult};

        /// Store whose insert_frame always fails.
        struct BrokenRecordStore;

        #[async_trait]
        impl JobStore for BrokenRecordStore {
            async fn insert_job(&self, _job: Job) -> StoreResult<()> {
                Ok(())
            }
            async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
                Err(StoreError::not_found(format!("job {id}")))
            }
            async fn transition(
                &self,
                id: &JobId,
                _next: JobStatus,
                _error_message: Option<String>,
                _now: DateTime<Utc>,
            ) -> StoreResult<Job> {
                Err(StoreError::not_found(format!("job {id}")))
            }
            async fn set_frame_count(&self, _id: &JobId, _n: u32) -> StoreResult<()> {
                Ok(())
            }
            async fn backfill_processing_started(
                &self,
                _id: &JobId,
                _started_at: DateTime<Utc>,
            ) -> StoreResult<()> {
                Ok(())
            }
            async fn insert_frame(&self, _frame: Frame) -> StoreResult<()> {
                Err(StoreError::backend("record insert refused"))
            }
            async fn list_frames(&self, _job_id: &JobId) -> StoreResult<Vec<Frame>> {
                Ok(Vec::new())
            }
            async fn delete_frame(&self, id: &FrameId) -> StoreResult<Frame> {
                Err(StoreError::not_found(format!("frame {id}")))
            }
            async fn delete_job(&self, _id: &JobId) -> StoreResult<Vec<Frame>> {
                Ok(Vec::new())
            }
            async fn list_pending_jobs(&self, _limit: usize) -> StoreResult<Vec<Job>> {
                Ok(Vec::new())
            }
            async fn list_processing_jobs_older_than(
                &self,
                _cutoff: DateTime<Utc>,
            ) -> StoreResult<Vec<Job>> {
                Ok(Vec::new())
            }
        }

        let objects = Arc::new(MemoryObjectStore::new());
        let frames = FrameStore::new(objects.clone(), Arc::new(BrokenRecordStore))
            .with_retry(fast_retry());
        let job = Job::new("project-1", "videos/a.mp4");

        let err = frames.persist_frame(&job, 0, vec![1]).await.unwrap_err();
        assert!(matches!(err, StorageError::RecordFailed(_)));

        // Bytes were uploaded, but without a queryable record the frame is
        // reported as failed.
        let key = frame_object_key(&job.project_id, &job.id, 0);
        assert!(objects.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_frame_objects_cascade() {
        let (objects, store, frames, job) = fixture();
        store.insert_job(job.clone()).await.unwrap();

        let f0 = frames.persist_frame(&job, 0, vec![1]).await.unwrap();
        let f1 = frames.persist_frame(&job, 1, vec![2]).await.unwrap();

        let deleted = frames
            .delete_frame_objects(&[f0.clone(), f1.clone()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(!objects.exists(&f0.storage_ref).await.unwrap());
        assert!(!objects.exists(&f1.storage_ref).await.unwrap());
    }
}
