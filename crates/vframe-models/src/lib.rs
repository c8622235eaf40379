//! Shared data models for the vframe pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Processing jobs and their status graph
//! - Extracted frames

pub mod frame;
pub mod job;

// Re-export common types
pub use frame::{Frame, FrameId};
pub use job::{InvalidTransition, Job, JobId, JobStatus};
