//! FFmpeg CLI wrapper for frame extraction.
//!
//! This crate provides:
//! - A command builder and runner for ffmpeg invocations
//! - Input probing via ffprobe
//! - Sampling policy selection from input duration/size
//! - The frame extraction runner

pub mod command;
pub mod error;
pub mod extract;
pub mod probe;
pub mod sampling;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::{FfmpegExtractor, FrameExtractor};
pub use probe::{probe_video, VideoInfo};
pub use sampling::SamplingPolicy;
