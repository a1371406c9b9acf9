//! Render configuration.
//!
//! [`RenderOptions`] is a builder that threads the pack settings (target
//! frame rate, threshold, inversion), output resolution, segment count,
//! progress callbacks, and cancellation tokens through a render without
//! polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bitframe::{CancellationToken, ProgressCallback, ProgressInfo, RenderOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = RenderOptions::new()
//!     .with_target_fps(30.0)
//!     .with_threshold(100)
//!     .with_resolution(Some(128), None)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use ffmpeg_next::format::Pixel;

use crate::media::CaptureTarget;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::scheduler::DEFAULT_SEGMENT_COUNT;
use crate::worker::DEFAULT_ARENA_CAPACITY;

/// Pixel layout of captured frames handed to the packer.
///
/// The packer reads luminance from any of these; the choice only affects
/// how many bytes travel through the pipeline per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp).
    Rgb8,
    /// 8-bit RGBA (32 bpp). Alpha is ignored when packing. This is the
    /// default.
    #[default]
    Rgba8,
    /// 8-bit grayscale (8 bpp). The sample is the luminance.
    Gray8,
}

impl PixelFormat {
    /// Bytes taken by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    /// Parse a user-facing name (`rgb8`, `rgba`, `gray`, ...).
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
            "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
            "gray8" | "gray" | "grey" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
            _ => None,
        }
    }
}

/// Output frame settings for capture.
///
/// Controls the pixel format and resolution of captured frames. When no
/// dimensions are set the source resolution is used. Setting one dimension
/// together with [`maintain_aspect_ratio`](FrameOutputOptions::maintain_aspect_ratio)
/// computes the other dimension automatically.
#[derive(Debug, Clone)]
pub struct FrameOutputOptions {
    /// Pixel format of captured buffers.
    pub pixel_format: PixelFormat,
    /// Target width. `None` keeps the source width.
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height.
    pub height: Option<u32>,
    /// When `true` and only one dimension is specified, the other is
    /// computed to preserve the source aspect ratio.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// Resolve the final output dimensions given the source size.
    ///
    /// Returns `(width, height)`.
    pub(crate) fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) if self.maintain_aspect_ratio && source_width > 0 => {
                let ratio = w as f64 / source_width as f64;
                let h = (source_height as f64 * ratio).round() as u32;
                (w, h.max(1))
            }
            (Some(w), None) => (w, source_height),
            (None, Some(h)) if self.maintain_aspect_ratio && source_height > 0 => {
                let ratio = h as f64 / source_height as f64;
                let w = (source_width as f64 * ratio).round() as u32;
                (w.max(1), h)
            }
            (None, Some(h)) => (source_width, h),
            (None, None) => (source_width, source_height),
        }
    }

    /// Resolve the capture target for a source of the given size.
    pub(crate) fn resolve(&self, source_width: u32, source_height: u32) -> CaptureTarget {
        let (width, height) = self.resolve_dimensions(source_width, source_height);
        CaptureTarget {
            width,
            height,
            pixel_format: self.pixel_format,
        }
    }
}

/// Configuration for a render.
///
/// All fields have sensible defaults: 30 fps, threshold 128, no inversion,
/// source resolution, four segments.
#[derive(Clone)]
pub struct RenderOptions {
    pub(crate) target_fps: f64,
    pub(crate) threshold: u8,
    pub(crate) invert: bool,
    pub(crate) segments: usize,
    pub(crate) arena_capacity: usize,
    pub(crate) frame_output: FrameOutputOptions,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for RenderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderOptions")
            .field("target_fps", &self.target_fps)
            .field("threshold", &self.threshold)
            .field("invert", &self.invert)
            .field("segments", &self.segments)
            .field("arena_capacity", &self.arena_capacity)
            .field("frame_output", &self.frame_output)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            target_fps: 30.0,
            threshold: 128,
            invert: false,
            segments: DEFAULT_SEGMENT_COUNT,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            frame_output: FrameOutputOptions::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the frame rate frames are sampled at.
    #[must_use]
    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.target_fps = fps;
        self
    }

    /// Set the luminance threshold (0-255). Pixels at or above it are on.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Swap on and off pixels.
    #[must_use]
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Set how many independent capture/pack pipelines run concurrently.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(1);
        self
    }

    /// Set the per-worker codec arena size in bytes.
    #[must_use]
    pub fn with_arena_capacity(mut self, bytes: usize) -> Self {
        self.arena_capacity = bytes;
        self
    }

    /// Attach a progress callback.
    ///
    /// The callback is invoked every [`batch_size`](RenderOptions::with_batch_size)
    /// packed frames.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// The token is checked between capture steps. A cancelled render
    /// returns [`BitframeError::Cancelled`](crate::BitframeError::Cancelled)
    /// after releasing every handle and worker.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the pixel format of captured buffers.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.frame_output.pixel_format = format;
        self
    }

    /// Set the output resolution of packed frames.
    ///
    /// Pass `None` for either dimension to keep the source value. When
    /// `maintain_aspect_ratio` is `true` (the default) and only one
    /// dimension is given, the other is computed automatically.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.frame_output.width = width;
        self.frame_output.height = height;
        self
    }

    /// Control whether aspect ratio is preserved when only one output
    /// dimension is specified. Defaults to `true`.
    #[must_use]
    pub fn with_maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.frame_output.maintain_aspect_ratio = maintain;
        self
    }

    /// Set the complete frame output configuration.
    #[must_use]
    pub fn with_frame_output(mut self, options: FrameOutputOptions) -> Self {
        self.frame_output = options;
        self
    }

    /// Target frame rate.
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Luminance threshold.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Whether output is inverted.
    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Number of segments.
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
