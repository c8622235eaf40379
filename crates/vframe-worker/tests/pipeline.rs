//! End-to-end pipeline tests over in-memory stores and a stub extractor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use vframe_media::{FrameExtractor, MediaError, MediaResult};
use vframe_models::{JobId, JobStatus};
use vframe_storage::{frame_object_key, FrameStore, MemoryObjectStore, ObjectStore, RetryConfig};
use vframe_store::{JobStore, MemoryJobStore};
use vframe_worker::source::LocalFileSource;
use vframe_worker::{
    run, JobExecutor, JobService, ProcessingContext, StuckJobReaper, WorkerConfig, WorkerError,
};

/// Extractor that fabricates a fixed number of frame files.
struct StubExtractor {
    frames: usize,
}

#[async_trait]
impl FrameExtractor for StubExtractor {
    async fn extract(&self, _video_path: &Path, out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut produced = Vec::new();
        for i in 0..self.frames {
            let path = out_dir.join(format!("frame_{i:05}.jpg"));
            tokio::fs::write(&path, vec![i as u8; 16]).await?;
            produced.push(path);
        }

        if produced.is_empty() {
            return Err(MediaError::NoFramesProduced);
        }
        Ok(produced)
    }
}

/// Extractor that fails like a crashed tool.
struct FailingExtractor;

#[async_trait]
impl FrameExtractor for FailingExtractor {
    async fn extract(&self, _video_path: &Path, _out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        Err(MediaError::extraction_failed(
            "FFmpeg exited with non-zero status",
            Some("moov atom not found".to_string()),
            Some(1),
        ))
    }
}

/// Extractor that cancels the job mid-run, before uploads begin.
struct CancellingExtractor {
    store: Arc<MemoryJobStore>,
    job_id: JobId,
}

#[async_trait]
impl FrameExtractor for CancellingExtractor {
    async fn extract(&self, _video_path: &Path, out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir).await?;
        let mut produced = Vec::new();
        for i in 0..3 {
            let path = out_dir.join(format!("frame_{i:05}.jpg"));
            tokio::fs::write(&path, vec![i as u8; 16]).await?;
            produced.push(path);
        }

        self.store
            .transition(&self.job_id, JobStatus::Cancelled, None, Utc::now())
            .await
            .expect("cancel during extraction");

        Ok(produced)
    }
}

struct Fixture {
    store: Arc<MemoryJobStore>,
    objects: Arc<MemoryObjectStore>,
    frames: Arc<FrameStore>,
    source_file: PathBuf,
    // Held for the lifetime of the test
    _work_dir: TempDir,
    work_root: String,
}

impl Fixture {
    async fn new() -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let source_file = work_dir.path().join("input.mp4");
        tokio::fs::write(&source_file, b"fake video bytes").await.unwrap();

        let store = Arc::new(MemoryJobStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let frames = Arc::new(
            FrameStore::new(objects.clone(), store.clone()).with_retry(
                RetryConfig::new("frame_upload_test").with_base_delay(Duration::from_millis(1)),
            ),
        );
        let work_root = work_dir.path().join("work").to_str().unwrap().to_string();

        Self {
            store,
            objects,
            frames,
            source_file,
            _work_dir: work_dir,
            work_root,
        }
    }

    fn ctx(&self, extractor: Arc<dyn FrameExtractor>) -> ProcessingContext {
        ProcessingContext {
            store: self.store.clone(),
            frames: self.frames.clone(),
            extractor,
            source: Arc::new(LocalFileSource::new()),
            config: WorkerConfig {
                work_dir: self.work_root.clone(),
                ..WorkerConfig::default()
            },
        }
    }

    fn service(&self) -> JobService {
        JobService::new(
            self.store.clone(),
            self.frames.clone(),
            Duration::from_secs(1800),
        )
    }

    async fn submit(&self) -> JobId {
        self.service()
            .submit_job("project-1", self.source_file.to_str().unwrap())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn scenario_a_all_frames_persist() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 5 }));
    run(&ctx, &job_id).await.unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.frame_count, 5);
    assert!(job.processing_started_at.is_some());
    assert!(job.processing_completed_at.is_some());
    assert!(job.error_message.is_none());

    let frames = fx.store.list_frames(&job_id).await.unwrap();
    let sequences: Vec<u32> = frames.iter().map(|f| f.sequence_number).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

    // Stored objects follow the deterministic key layout
    for frame in &frames {
        assert_eq!(
            frame.storage_ref,
            frame_object_key("project-1", &job_id, frame.sequence_number)
        );
        assert!(fx.objects.exists(&frame.storage_ref).await.unwrap());
    }
}

#[tokio::test]
async fn scenario_b_empty_extraction_errors() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 0 }));
    run(&ctx, &job_id).await.unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(
        job.error_message.as_deref(),
        Some("no frames could be generated")
    );
    assert!(fx.store.list_frames(&job_id).await.unwrap().is_empty());
    assert!(fx.objects.is_empty().await);
}

#[tokio::test]
async fn scenario_c_failed_upload_leaves_gap() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    // Frame 1's uploads fail past all retries; 0 and 2 succeed
    let doomed_key = frame_object_key("project-1", &job_id, 1);
    fx.objects.fail_next_puts(&doomed_key, 10).await;

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 3 }));
    run(&ctx, &job_id).await.unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.frame_count, 2);

    let frames = fx.store.list_frames(&job_id).await.unwrap();
    let sequences: Vec<u32> = frames.iter().map(|f| f.sequence_number).collect();
    assert_eq!(sequences, vec![0, 2]);

    // Initial attempt plus three retries
    assert_eq!(fx.objects.put_calls(&doomed_key).await, 4);
    assert!(!fx.objects.exists(&doomed_key).await.unwrap());
}

#[tokio::test]
async fn extraction_failure_captured_verbatim() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let ctx = fx.ctx(Arc::new(FailingExtractor));
    run(&ctx, &job_id).await.unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    let message = job.error_message.unwrap();
    assert!(message.contains("FFmpeg exited with non-zero status"));
    assert!(job.processing_completed_at.is_some());
}

#[tokio::test]
async fn missing_source_errors_job() {
    let fx = Fixture::new().await;
    let job_id = fx
        .service()
        .submit_job("project-1", "/nonexistent/input.mp4")
        .await
        .unwrap();

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 3 }));
    run(&ctx, &job_id).await.unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error_message.unwrap().contains("source unavailable"));
}

#[tokio::test]
async fn claiming_a_processing_job_fails() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;
    fx.store
        .transition(&job_id, JobStatus::Processing, None, Utc::now())
        .await
        .unwrap();

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 3 }));
    let err = run(&ctx, &job_id).await.unwrap_err();
    assert!(matches!(err, WorkerError::AlreadyProcessing));
}

#[tokio::test]
async fn claiming_a_stale_processing_job_times_out() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;
    fx.store
        .transition(
            &job_id,
            JobStatus::Processing,
            None,
            Utc::now() - chrono::Duration::minutes(40),
        )
        .await
        .unwrap();

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 3 }));
    let err = run(&ctx, &job_id).await.unwrap_err();
    assert!(matches!(err, WorkerError::TimedOut));
}

#[tokio::test]
async fn cancellation_stops_uploads_cooperatively() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let ctx = fx.ctx(Arc::new(CancellingExtractor {
        store: fx.store.clone(),
        job_id: job_id.clone(),
    }));
    run(&ctx, &job_id).await.unwrap();

    // The worker noticed the cancellation before the first upload and left
    // the terminal state alone
    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.frame_count, 0);
    assert!(fx.store.list_frames(&job_id).await.unwrap().is_empty());
    assert!(fx.objects.is_empty().await);
}

#[tokio::test]
async fn scenario_d_sweep_reaps_stuck_job() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let now = Utc::now();
    fx.store
        .transition(
            &job_id,
            JobStatus::Processing,
            None,
            now - chrono::Duration::minutes(40),
        )
        .await
        .unwrap();

    let reaper = StuckJobReaper::new(
        fx.store.clone(),
        Duration::from_secs(30 * 60),
        Duration::from_secs(60),
    );

    let outcome = reaper.sweep(now).await.unwrap();
    assert_eq!(outcome.reaped, 1);

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(
        job.error_message.as_deref(),
        Some("processing timeout exceeded")
    );
    assert_eq!(job.processing_completed_at, Some(now));

    // A second immediate sweep is a no-op for that job
    let outcome = reaper.sweep(now).await.unwrap();
    assert_eq!(outcome.reaped, 0);
}

#[tokio::test]
async fn sweep_spares_fresh_jobs() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let now = Utc::now();
    fx.store
        .transition(
            &job_id,
            JobStatus::Processing,
            None,
            now - chrono::Duration::minutes(10),
        )
        .await
        .unwrap();

    let reaper = StuckJobReaper::new(
        fx.store.clone(),
        Duration::from_secs(30 * 60),
        Duration::from_secs(60),
    );

    let outcome = reaper.sweep(now).await.unwrap();
    assert_eq!(outcome.reaped, 0);
    assert_eq!(
        fx.store.get_job(&job_id).await.unwrap().status,
        JobStatus::Processing
    );
}

#[tokio::test]
async fn sweep_backfills_missing_start_time() {
    let fx = Fixture::new().await;

    // A processing row migrated from an older schema, with no start time
    let mut job = vframe_models::Job::new("project-1", "videos/migrated.mp4");
    job.status = JobStatus::Processing;
    job.created_at = Utc::now() - chrono::Duration::hours(2);
    let job_id = job.id.clone();
    let created_at = job.created_at;
    fx.store.insert_job(job).await.unwrap();

    let reaper = StuckJobReaper::new(
        fx.store.clone(),
        Duration::from_secs(30 * 60),
        Duration::from_secs(60),
    );

    // First sweep backfills rather than reaping
    let outcome = reaper.sweep(Utc::now()).await.unwrap();
    assert_eq!(outcome.reaped, 0);
    assert_eq!(outcome.backfilled, 1);

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.processing_started_at, Some(created_at));

    // The backfilled start time is old, so the next sweep reaps it
    let outcome = reaper.sweep(Utc::now()).await.unwrap();
    assert_eq!(outcome.reaped, 1);
    assert_eq!(
        fx.store.get_job(&job_id).await.unwrap().status,
        JobStatus::Error
    );
}

#[tokio::test]
async fn executor_claims_and_processes_pending_jobs() {
    let fx = Fixture::new().await;
    let job_id = fx.submit().await;

    let ctx = ProcessingContext {
        store: fx.store.clone(),
        frames: fx.frames.clone(),
        extractor: Arc::new(StubExtractor { frames: 2 }),
        source: Arc::new(LocalFileSource::new()),
        config: WorkerConfig {
            work_dir: fx.work_root.clone(),
            claim_interval: Duration::from_millis(20),
            ..WorkerConfig::default()
        },
    };

    let executor = Arc::new(JobExecutor::new(ctx));
    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    // Wait for the claim loop to pick the job up and finish it
    for _ in 0..200 {
        if fx.store.get_job(&job_id).await.unwrap().status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    executor.shutdown();
    runner.await.unwrap().unwrap();

    let job = fx.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.frame_count, 2);
}

#[tokio::test]
async fn service_delete_single_frame() {
    let fx = Fixture::new().await;
    let service = fx.service();
    let job_id = fx.submit().await;

    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 2 }));
    run(&ctx, &job_id).await.unwrap();

    let frames = service.list_frames(&job_id).await.unwrap();
    assert_eq!(frames.len(), 2);

    service.delete_frame(&frames[0].id).await.unwrap();
    assert!(!fx.objects.exists(&frames[0].storage_ref).await.unwrap());
    assert!(fx.objects.exists(&frames[1].storage_ref).await.unwrap());
    assert_eq!(service.list_frames(&job_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn service_cancel_and_delete() {
    let fx = Fixture::new().await;
    let service = fx.service();
    let job_id = fx.submit().await;

    // Run the job to completion, then delete it
    let ctx = fx.ctx(Arc::new(StubExtractor { frames: 3 }));
    run(&ctx, &job_id).await.unwrap();
    assert_eq!(fx.objects.len().await, 3);

    service.delete_job(&job_id).await.unwrap();
    assert!(fx.objects.is_empty().await);
    assert!(service.get_job_status(&job_id).await.is_err());

    // Cancelling a pending job is terminal
    let other = fx.submit().await;
    let job = service.cancel_job(&other).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.processing_completed_at.is_some());
    assert!(service.cancel_job(&other).await.is_err());
}
