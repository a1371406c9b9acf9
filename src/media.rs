//! Media source abstraction.
//!
//! A render never touches a decoder directly. It asks a [`MediaSource`] for
//! one [`CaptureHandle`] per segment, and each handle keeps its own
//! timeline position so segments can seek independently.
//!
//! [`VideoSource`](crate::VideoSource) implements the trait over FFmpeg;
//! [`MemorySource`] replays frames already in memory.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::codec::PixelBuffer;
use crate::configuration::PixelFormat;
use crate::error::BitframeError;

/// Resolution and pixel format a capture handle must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTarget {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output pixel format.
    pub pixel_format: PixelFormat,
}

/// A seekable video timeline.
///
/// Sources are shared read-only across capture threads, hence the
/// `Send + Sync` bound.
pub trait MediaSource: Send + Sync {
    /// Total length of the timeline.
    fn duration(&self) -> Duration;

    /// Native `(width, height)` of the frames.
    fn native_size(&self) -> (u32, u32);

    /// Open an independent handle producing frames shaped like `target`.
    ///
    /// Handles may return frames of another size; the capture unit resizes
    /// them.
    fn open_handle(&self, target: CaptureTarget) -> Result<Box<dyn CaptureHandle>, BitframeError>;

    /// Short human-readable name for logs.
    fn describe(&self) -> String {
        let (width, height) = self.native_size();
        format!("{width}x{height} source, {:?}", self.duration())
    }
}

/// One isolated playback position on a [`MediaSource`].
///
/// Handles are opened on the thread that uses them and never move, so
/// they need not be `Send` (FFmpeg scaler contexts are not).
pub trait CaptureHandle {
    /// Return the frame displayed at `timestamp`.
    fn seek(&mut self, timestamp: Duration) -> Result<PixelBuffer, BitframeError>;
}

/// A source backed by frames held in memory, shown at a fixed rate.
///
/// Frame `i` covers `[i / fps, (i + 1) / fps)`. Timestamps past the end
/// show the last frame.
///
/// ```
/// use std::time::Duration;
///
/// use bitframe::{MediaSource, MemorySource, PixelBuffer, PixelFormat};
///
/// let black = PixelBuffer::filled(4, 8, PixelFormat::Rgba8, &[0, 0, 0, 255])?;
/// let white = PixelBuffer::filled(4, 8, PixelFormat::Rgba8, &[255, 255, 255, 255])?;
/// let source = MemorySource::new(vec![black, white], 2.0)?;
/// assert_eq!(source.duration(), Duration::from_secs(1));
/// # Ok::<(), bitframe::BitframeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Arc<Vec<PixelBuffer>>,
    fps: f64,
    duration: Duration,
    width: u32,
    height: u32,
}

impl MemorySource {
    /// Wrap `frames`, played back at `fps`.
    ///
    /// # Errors
    ///
    /// - [`BitframeError::InvalidFrameRate`] if `fps` is not positive or so
    ///   small that the playback duration is not representable.
    /// - [`BitframeError::InvalidDimensions`] if `frames` is empty.
    pub fn new(frames: Vec<PixelBuffer>, fps: f64) -> Result<Self, BitframeError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(BitframeError::InvalidFrameRate(fps));
        }
        let Some(first) = frames.first() else {
            return Err(BitframeError::InvalidDimensions {
                width: 0,
                height: 0,
            });
        };
        let (width, height) = (first.width(), first.height());
        let duration = Duration::try_from_secs_f64(frames.len() as f64 / fps)
            .map_err(|_| BitframeError::InvalidFrameRate(fps))?;
        Ok(Self {
            frames: Arc::new(frames),
            fps,
            duration,
            width,
            height,
        })
    }

    /// Number of frames held.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Playback rate.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn index_at(&self, timestamp: Duration) -> usize {
        // Absorbs nanosecond truncation of `k / fps` timestamps.
        let position = timestamp.as_secs_f64() * self.fps + 1e-6;
        (position.floor() as usize).min(self.frames.len() - 1)
    }
}

impl MediaSource for MemorySource {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn native_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn open_handle(&self, target: CaptureTarget) -> Result<Box<dyn CaptureHandle>, BitframeError> {
        debug!(
            "Opening memory capture handle ({} frames, {}x{} target)",
            self.frames.len(),
            target.width,
            target.height
        );
        Ok(Box::new(MemoryCaptureHandle {
            source: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!(
            "{} in-memory frames at {} fps ({}x{})",
            self.frames.len(),
            self.fps,
            self.width,
            self.height
        )
    }
}

struct MemoryCaptureHandle {
    source: MemorySource,
}

impl CaptureHandle for MemoryCaptureHandle {
    fn seek(&mut self, timestamp: Duration) -> Result<PixelBuffer, BitframeError> {
        let index = self.source.index_at(timestamp);
        Ok(self.source.frames[index].clone())
    }
}
