//! # bitframe
//!
//! Turn videos into sequences of 1-bit packed frames for LED matrices,
//! microcontroller displays, and other players with almost no bandwidth.
//!
//! A render captures stills from a video at a fixed rate, thresholds each
//! pixel's luminance, and packs eight pixels per byte. Capture and packing
//! run as several independent segment pipelines whose results are merged
//! back into frame order. The packed frames can then be exported to raw
//! binary, gzip, JSON (hex or base64) or an Arduino C header, and loaded
//! back for playback.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bitframe::container::{self, ContainerFormat, ExportMeta};
//! use bitframe::{BitframeError, RenderOptions, RenderSession, VideoSource};
//!
//! let source = VideoSource::open("input.mp4")?;
//! let options = RenderOptions::new()
//!     .with_resolution(Some(128), Some(64))
//!     .with_target_fps(30.0)
//!     .with_threshold(128);
//!
//! let mut session = RenderSession::new();
//! session.render(&source, &options)?;
//! let sequence = session.take_sequence().unwrap();
//!
//! let meta = ExportMeta::from_sequence("input.mp4", &sequence);
//! let encoded = container::export(ContainerFormat::BinaryGzip, sequence.frames(), &meta)?;
//! std::fs::write(container::export_file_name("input", &meta, encoded.format), encoded.bytes)?;
//! # Ok::<(), BitframeError>(())
//! ```
//!
//! ## Packed layout
//!
//! Rows run top to bottom; each byte holds eight horizontal pixels, most
//! significant bit first; every row starts on a fresh byte. A frame is
//! therefore `ceil(width / 8) * height` bytes. See [`codec`].
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `gzip` | Gzip containers and transparent gzip decoding (default) |
//! | `async` | [`render_async`] and `RenderFuture` via Tokio |
//! | `rayon` | Parallel playback cache build |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build the
//! [`VideoSource`] backend.

pub mod cache;
pub mod capture;
pub mod codec;
pub mod configuration;
pub mod container;
pub mod error;
pub mod ffmpeg;
pub mod ingest;
pub mod media;
pub mod metadata;
pub mod progress;
pub mod scheduler;
pub mod sequence;
pub mod session;
#[cfg(feature = "async")]
pub mod stream;
mod utilities;
pub mod video;
pub mod worker;

pub use cache::{Bitmap, CacheOptions, Playback, PlaybackCache};
pub use capture::FrameCaptureUnit;
pub use codec::{PackedFrame, PixelBuffer, get_pixel, get_pixel_in_sequence, pack, unpack};
pub use configuration::{FrameOutputOptions, PixelFormat, RenderOptions};
pub use container::{ContainerFormat, ExportMeta, decode_container};
pub use error::BitframeError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use ingest::{Dimensions, parse_file_name};
pub use media::{CaptureHandle, MediaSource, MemorySource};
pub use metadata::{RenderMeta, VideoMetadata};
pub use progress::{
    CancellationToken, OperationType, ProgressCallback, ProgressHandle, ProgressInfo,
    ProgressState, RenderProgress,
};
pub use sequence::FrameSequence;
pub use session::{RenderSession, render};
#[cfg(feature = "async")]
pub use stream::{RenderFuture, render_async};
pub use video::VideoSource;
