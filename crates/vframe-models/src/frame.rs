//! Extracted frame records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::JobId;

/// Unique identifier for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    /// Generate a new random frame ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One extracted still image belonging to a job.
///
/// Frames are immutable once created; they are only ever deleted, either
/// individually or by the owning job's deletion cascade. `sequence_number`
/// values are contiguous from 0 on a completed job; gaps are permitted
/// transiently while the job is still processing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Frame {
    /// Unique frame ID
    pub id: FrameId,

    /// Owning job; a frame never outlives its job
    pub job_id: JobId,

    /// Zero-based extraction order within the job
    pub sequence_number: u32,

    /// Object-storage key for the persisted image bytes
    pub storage_ref: String,

    /// Set once, on successful persistence
    pub created_at: DateTime<Utc>,
}

impl Frame {
    /// Create a new frame record.
    pub fn new(job_id: JobId, sequence_number: u32, storage_ref: impl Into<String>) -> Self {
        Self {
            id: FrameId::new(),
            job_id,
            sequence_number,
            storage_ref: storage_ref.into(),
            created_at: Utc::now(),
        }
    }
}
