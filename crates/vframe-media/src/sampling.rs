//! Frame sampling policy.

use serde::{Deserialize, Serialize};

/// Inputs up to this duration use the dense tier.
const SHORT_INPUT_SECS: f64 = 60.0;
/// Inputs up to this duration use the medium tier.
const MEDIUM_INPUT_SECS: f64 = 600.0;
/// Inputs at least this large always use the sparse tier, whatever their
/// duration claims.
const LARGE_INPUT_BYTES: u64 = 750 * 1024 * 1024;

/// The (interval, max-count) pair governing extraction for one input.
///
/// Longer or larger inputs get a larger interval and a capped frame count:
/// the cap is the backpressure mechanism that bounds per-job work no matter
/// what is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Seconds between sampled frames
    pub interval_seconds: f64,
    /// Upper bound on extracted frames
    pub max_frames: u32,
}

impl SamplingPolicy {
    /// Dense sampling for short clips.
    pub const SHORT: Self = Self {
        interval_seconds: 1.0,
        max_frames: 60,
    };

    /// Medium tier.
    pub const MEDIUM: Self = Self {
        interval_seconds: 2.0,
        max_frames: 150,
    };

    /// Sparse tier for long or oversized inputs.
    pub const SPARSE: Self = Self {
        interval_seconds: 5.0,
        max_frames: 200,
    };

    /// Select the policy for an input's duration and file size.
    pub fn for_input(duration_secs: f64, size_bytes: u64) -> Self {
        if size_bytes >= LARGE_INPUT_BYTES {
            return Self::SPARSE;
        }
        if duration_secs <= SHORT_INPUT_SECS {
            Self::SHORT
        } else if duration_secs <= MEDIUM_INPUT_SECS {
            Self::MEDIUM
        } else {
            Self::SPARSE
        }
    }

    /// The ffmpeg `fps` filter expression for this interval.
    pub fn fps_filter(&self) -> String {
        format!("fps=1/{}", self.interval_seconds)
    }
}
