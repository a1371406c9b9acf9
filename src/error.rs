//! Error types for the `bitframe` crate.
//!
//! This module defines [`BitframeError`], the unified error type returned by
//! every fallible operation in the crate. Render failures carry the segment
//! and frame context needed to diagnose them, and container decode failures
//! name the offending field.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `bitframe` operations.
///
/// A render is atomic: any variant returned from
/// [`RenderSession::render`](crate::RenderSession::render) means no frames
/// were published. Capability gaps ([`UnsupportedCapability`](Self::UnsupportedCapability))
/// are only surfaced when no fallback exists.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BitframeError {
    /// The packing codec could not be made ready. Raised before any capture
    /// starts.
    #[error("Packing codec unavailable: {0}")]
    ResourceUnavailable(String),

    /// A segment's capture handle never became ready.
    #[error("Capture handle for segment {segment} unavailable: {reason}")]
    CaptureUnavailable {
        /// Segment that failed to open its handle.
        segment: usize,
        /// Underlying reason.
        reason: String,
    },

    /// A capture handle failed to reach a timestamp.
    #[error("Segment {segment} failed to seek to {timestamp:?}: {reason}")]
    SeekError {
        /// Segment whose handle failed.
        segment: usize,
        /// Timestamp that was requested.
        timestamp: Duration,
        /// Underlying reason.
        reason: String,
    },

    /// Merge found a frame index that no segment produced.
    #[error("Render incomplete: frame {frame_index} of {total_frames} is missing")]
    IncompleteRender {
        /// The missing frame index.
        frame_index: u64,
        /// Total frames expected.
        total_frames: u64,
    },

    /// A container or raw buffer could not be decoded.
    #[error("Failed to decode `{field}`: {reason}")]
    DecodeError {
        /// Name of the offending field (e.g. `bytesPerFrame`, `data[3]`).
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The requested capability is not compiled into this build.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Width or height is zero or otherwise unusable.
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Target frame rate is zero, negative, or not finite.
    #[error("Invalid target frame rate: {0}")]
    InvalidFrameRate(f64),

    /// A pixel buffer's length does not match its declared shape.
    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferMismatch {
        /// Length implied by width, height, and pixel format.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// The codec arena cannot hold the packed output of one frame.
    #[error("Codec arena exhausted: frame needs {requested} bytes, arena holds {capacity}")]
    ArenaExhausted {
        /// Bytes needed for the packed frame.
        requested: usize,
        /// Arena capacity in bytes.
        capacity: usize,
    },

    /// A packing worker's channel closed unexpectedly.
    #[error("Packing worker {worker} disconnected")]
    WorkerDisconnected {
        /// Worker identifier.
        worker: usize,
    },

    /// A packing worker replied with an error.
    #[error("Packing worker {worker} failed on frame {frame_index:?}: {message}")]
    WorkerFailed {
        /// Worker identifier.
        worker: usize,
        /// Frame being packed, if the failure was tied to one.
        frame_index: Option<u64>,
        /// Error message reported by the worker.
        message: String,
    },

    /// A playback frame index is past the end of the sequence.
    #[error("Frame {frame_index} is out of range (sequence has {frame_count} frames)")]
    FrameOutOfRange {
        /// Requested index.
        frame_index: usize,
        /// Number of frames available.
        frame_count: usize,
    },

    /// A file name does not carry a `WIDTHxHEIGHT@FPS` pattern.
    #[error("No WIDTHxHEIGHT@FPS pattern in file name `{0}`")]
    InvalidFileName(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`VideoSource::open`](crate::VideoSource::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A JSON container could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
}

impl From<FfmpegError> for BitframeError {
    fn from(error: FfmpegError) -> Self {
        BitframeError::FfmpegError(error.to_string())
    }
}

impl BitframeError {
    /// Shorthand for a [`DecodeError`](Self::DecodeError).
    pub(crate) fn decode(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BitframeError::DecodeError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
