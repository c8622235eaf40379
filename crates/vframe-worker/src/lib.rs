//! Video frame-extraction worker.
//!
//! This crate provides:
//! - The processing worker that drives one job to a terminal state
//! - Source acquisition (local file and remote URL)
//! - The stuck-job reaper
//! - A pending-job claim loop
//! - The service facade consumed by the API layer

pub mod config;
pub mod error;
pub mod executor;
pub mod processor;
pub mod reaper;
pub mod service;
pub mod source;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use processor::{run, ProcessingContext};
pub use reaper::{StuckJobReaper, SweepOutcome};
pub use service::JobService;
pub use source::{HttpSource, LocalFileSource, SourceReader};
