//! Job definitions and the status graph.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
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

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
///
/// Legal transitions:
/// `pending -> processing -> {completed | error}`, plus
/// `pending -> cancelled` and `processing -> cancelled`.
/// Terminal states admit no further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be claimed
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed
    Error,
    /// Job was cancelled by the user
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Check whether `next` is reachable from this status in one step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
                | (JobStatus::Processing, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attempted status change that is not an edge of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One video's processing lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning project; prefixes the object-storage keys for this job's frames
    pub project_id: String,

    /// Opaque locator for the input video (path or URL)
    pub source_ref: String,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Set exactly once, when status first becomes `processing`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,

    /// Set exactly once, when status reaches a terminal value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<DateTime<Utc>>,

    /// Error message (only when status is `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Count of frames successfully persisted
    #[serde(default)]
    pub frame_count: u32,
}

impl Job {
    /// Create a new pending job.
    pub fn new(project_id: impl Into<String>, source_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            project_id: project_id.into(),
            source_ref: source_ref.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            processing_completed_at: None,
            error_message: None,
            frame_count: 0,
        }
    }

    /// Apply a status transition, stamping timestamps per the lifecycle rules.
    ///
    /// Entering `processing` sets `processing_started_at` only if it is still
    /// unset, so a re-claimed job never gets its start time re-stamped.
    /// Entering a terminal state sets `processing_completed_at`. The error
    /// message is recorded only when entering `error`.
    pub fn apply_transition(
        &mut self,
        next: JobStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = now;

        if next == JobStatus::Processing && self.processing_started_at.is_none() {
            self.processing_started_at = Some(now);
        }

        if next.is_terminal() {
            self.processing_completed_at = Some(now);
        }

        if next == JobStatus::Error {
            self.error_message = error_message;
        }

        Ok(())
    }
}
