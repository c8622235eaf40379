//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("job is already being processed")]
    AlreadyProcessing,

    #[error("job exceeded its processing budget")]
    TimedOut,

    #[error("Store error: {0}")]
    Store(#[from] vframe_store::StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] vframe_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vframe_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Check whether this is a claim failure: the job was not ours to run
    /// and its record must not be touched.
    pub fn is_claim_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::AlreadyProcessing
                | WorkerError::TimedOut
                | WorkerError::Store(vframe_store::StoreError::NotFound(_))
        )
    }
}
