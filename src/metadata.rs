//! Metadata types.
//!
//! [`VideoMetadata`] describes a source video and is read once when a
//! [`VideoSource`](crate::VideoSource) is opened. [`RenderMeta`] describes
//! the packed sequence a render produced.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::bytes_per_frame;

/// Metadata for a source video stream.
///
/// # Example
///
/// ```no_run
/// use bitframe::{MediaSource, VideoSource};
///
/// let source = VideoSource::open("input.mp4").unwrap();
/// let metadata = source.metadata();
/// println!("{}x{} @ {:.2} fps", metadata.width, metadata.height, metadata.frames_per_second);
/// ```
#[derive(Debug, Clone, Serialize)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, computed from duration and frame rate.
    pub frame_count: u64,
    /// Total duration of the stream.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Container format name (e.g. `"mp4"`, `"matroska"`).
    pub format: String,
}

/// Shape and timing of a packed frame sequence.
///
/// Created at render start from the source duration and target frame rate.
/// After packing, [`finalize`](RenderMeta::finalize) records the actual
/// frame count and recomputes `fps` from it, so the stored rate can drift
/// slightly from the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMeta {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Source duration in seconds.
    pub duration: f64,
    /// Number of frames in the sequence.
    #[serde(rename = "frames")]
    pub frame_count: u64,
    /// Frames per second.
    pub fps: f64,
    /// Packed bytes per frame, `ceil(width / 8) * height`.
    pub bytes_per_frame: usize,
}

impl RenderMeta {
    /// Metadata for a sequence of `frame_count` frames at `fps`.
    pub fn new(width: u32, height: u32, duration: f64, frame_count: u64, fps: f64) -> Self {
        Self {
            width,
            height,
            duration,
            frame_count,
            fps,
            bytes_per_frame: bytes_per_frame(width, height),
        }
    }

    /// Record the number of frames actually packed.
    ///
    /// `fps` becomes `frame_count / duration`, or `0` for a zero duration.
    pub fn finalize(&mut self, frame_count: u64) {
        self.frame_count = frame_count;
        self.fps = if self.duration > 0.0 {
            frame_count as f64 / self.duration
        } else {
            0.0
        };
    }

    /// Interval between frames at the stored rate, or `None` when the
    /// rate is not positive.
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps.is_finite() && self.fps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / self.fps).ok())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_recomputes_fps() {
        let mut meta = RenderMeta::new(16, 8, 2.5, 75, 30.0);
        meta.finalize(74);
        assert_eq!(meta.frame_count, 74);
        assert!((meta.fps - 29.6).abs() < 1e-9);
    }

    #[test]
    fn finalize_with_zero_duration() {
        let mut meta = RenderMeta::new(8, 8, 0.0, 1, 30.0);
        meta.finalize(1);
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.frame_interval(), None);
    }
}
