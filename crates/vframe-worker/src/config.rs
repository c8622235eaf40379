//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Budget after which a processing job is considered stuck. Must exceed
    /// any plausible legitimate processing duration so the reaper never
    /// races a live worker.
    pub max_processing_duration: Duration,
    /// Interval between reaper sweeps
    pub sweep_interval: Duration,
    /// How often the claim loop scans for pending jobs
    pub claim_interval: Duration,
    /// Timeout for one extraction run
    pub extraction_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_processing_duration: Duration::from_secs(1800), // 30 minutes
            sweep_interval: Duration::from_secs(60),
            claim_interval: Duration::from_secs(5),
            extraction_timeout: Duration::from_secs(600),
            work_dir: "/tmp/vframe".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_processing_duration: Duration::from_secs(
                std::env::var("WORKER_MAX_PROCESSING_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("WORKER_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            extraction_timeout: Duration::from_secs(
                std::env::var("WORKER_EXTRACTION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/vframe".to_string()),
        }
    }
}
