//! Frame extraction runner.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use crate::sampling::SamplingPolicy;

/// Filename prefix for extracted frames.
const FRAME_PREFIX: &str = "frame_";
/// Filename extension for extracted frames.
const FRAME_EXT: &str = "jpg";

/// Extracts an ordered sequence of still images from a video file.
///
/// The runner owns sampling-rate policy: implementations size the interval
/// and frame cap to the input. The sequence is finite and ordered by
/// extraction time; callers read the produced files lazily, one upload at
/// a time, after extraction has fully completed.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Run extraction into `out_dir`, returning the produced image files in
    /// sequence order. Fails with `ExtractionFailed` when the tool exits
    /// non-zero and `NoFramesProduced` when it exits clean but yields
    /// nothing.
    async fn extract(&self, video_path: &Path, out_dir: &Path) -> MediaResult<Vec<PathBuf>>;
}

/// FFmpeg-backed frame extractor.
#[derive(Debug, Default)]
pub struct FfmpegExtractor {
    /// Timeout for one extraction run, in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the extraction run's wall-clock time.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run extraction under an explicit sampling policy.
    pub async fn extract_with_policy(
        &self,
        video_path: &Path,
        policy: &SamplingPolicy,
        out_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        if !video_path.exists() {
            return Err(MediaError::FileNotFound(video_path.to_path_buf()));
        }
        tokio::fs::create_dir_all(out_dir).await?;

        let pattern = out_dir.join(format!("{FRAME_PREFIX}%05d.{FRAME_EXT}"));
        let cmd = FfmpegCommand::new(video_path, &pattern)
            .video_filter(policy.fps_filter())
            .max_frames(policy.max_frames)
            .quality(2)
            .log_level("error");

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner.run(&cmd).await?;

        let frames = collect_frames(out_dir).await?;
        if frames.is_empty() {
            return Err(MediaError::NoFramesProduced);
        }

        info!(
            "Extracted {} frames from {} (interval {}s)",
            frames.len(),
            video_path.display(),
            policy.interval_seconds
        );
        Ok(frames)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video_path: &Path, out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        let info = probe_video(video_path).await?;
        let policy = SamplingPolicy::for_input(info.duration, info.size);
        debug!(
            duration = info.duration,
            size = info.size,
            interval = policy.interval_seconds,
            max_frames = policy.max_frames,
            "Selected sampling policy"
        );

        self.extract_with_policy(video_path, &policy, out_dir).await
    }
}

/// Collect produced frame files from `dir` in sequence order.
async fn collect_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_frame_file(&path) {
            frames.push(path);
        }
    }

    frames.sort();
    debug!("Collected {} frame files from {}", frames.len(), dir.display());
    Ok(frames)
}

/// Check whether a path looks like one of our produced frames.
fn is_frame_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(FRAME_PREFIX) && name.ends_with(&format!(".{FRAME_EXT}"))
}
