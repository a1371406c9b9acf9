//! FFmpeg-backed video source.
//!
//! [`VideoSource`] reads a file's metadata once at open time. Each capture
//! handle then opens the file again with its own demuxer, decoder and
//! scaler, so segments never share a timeline position.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Rational,
    codec::{context::Context as CodecContext, decoder::Video as VideoDecoder},
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use log::{debug, trace};

use crate::codec::{self, PixelBuffer};
use crate::configuration::PixelFormat;
use crate::error::BitframeError;
use crate::media::{CaptureHandle, CaptureTarget, MediaSource};
use crate::metadata::VideoMetadata;
use crate::utilities;

/// Forward distance in seconds a handle decodes through instead of seeking.
const RESEEK_WINDOW: f64 = 2.0;

/// Slack when comparing presentation times to targets.
const PTS_EPSILON: f64 = 1e-6;

/// A video file on disk.
///
/// # Example
///
/// ```no_run
/// use bitframe::{BitframeError, MediaSource, VideoSource};
///
/// let source = VideoSource::open("input.mp4")?;
/// println!("{:?} of video at {:?}", source.duration(), source.native_size());
/// # Ok::<(), BitframeError>(())
/// ```
pub struct VideoSource {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl VideoSource {
    /// Open a video file and read its metadata.
    ///
    /// Initializes FFmpeg (idempotent) and locates the best video stream.
    ///
    /// # Errors
    ///
    /// - [`BitframeError::FileOpen`] if the file cannot be opened or its
    ///   decoder cannot be created.
    /// - [`BitframeError::NoVideoStream`] if the file has no video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BitframeError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening video source: {}", path.display());

        let input = open_input(&path)?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(BitframeError::NoVideoStream)?;
        let stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| BitframeError::FileOpen {
                path: path.clone(),
                reason: format!("Failed to create video decoder for stream {stream_index}: {error}"),
            })?;

        let frames_per_second = utilities::rational_to_fps(stream.avg_frame_rate())
            .or_else(|| utilities::rational_to_fps(stream.rate()))
            .unwrap_or(0.0);

        // Container duration first, stream duration as a fallback.
        let container_micros = input.duration();
        let duration = if container_micros > 0 {
            Duration::from_micros(container_micros as u64)
        } else {
            utilities::stream_duration(stream.duration(), stream.time_base())
        };

        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input.format().name().to_string(),
        };
        debug!(
            "Video stream {stream_index}: {}x{} {} at {:.3} fps, {:?}",
            metadata.width, metadata.height, metadata.codec, frames_per_second, duration
        );

        Ok(Self { path, metadata })
    }

    /// Metadata read at open time.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaSource for VideoSource {
    fn duration(&self) -> Duration {
        self.metadata.duration
    }

    fn native_size(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn open_handle(&self, target: CaptureTarget) -> Result<Box<dyn CaptureHandle>, BitframeError> {
        Ok(Box::new(VideoCaptureHandle::open(&self.path, target)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn open_input(path: &Path) -> Result<Input, BitframeError> {
    ffmpeg_next::init().map_err(|error| BitframeError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;
    ffmpeg_next::format::input(&path).map_err(|error| BitframeError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

struct HeldFrame {
    seconds: f64,
    frame: VideoFrame,
}

/// An independent demuxer + decoder + scaler over one file.
///
/// Keeps the frame shown at the last requested time and one decoded frame
/// of lookahead, so monotonically increasing requests decode forward
/// without seeking.
struct VideoCaptureHandle {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    target: CaptureTarget,
    /// Last decoded frame with `pts <= last_target`.
    current: Option<HeldFrame>,
    /// First decoded frame with `pts > last_target`.
    pending: Option<HeldFrame>,
    last_target: Option<f64>,
    draining: bool,
    exhausted: bool,
}

impl VideoCaptureHandle {
    fn open(path: &Path, target: CaptureTarget) -> Result<Self, BitframeError> {
        let input = open_input(path)?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(BitframeError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            scaler_format(target.pixel_format).to_ffmpeg_pixel(),
            target.width,
            target.height,
            ScalingFlags::BILINEAR,
        )?;

        debug!(
            "Opened capture handle on {} (stream {stream_index}, {}x{} -> {}x{})",
            path.display(),
            decoder.width(),
            decoder.height(),
            target.width,
            target.height
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            target,
            current: None,
            pending: None,
            last_target: None,
            draining: false,
            exhausted: false,
        })
    }

    fn latest_seconds(&self) -> f64 {
        self.pending
            .as_ref()
            .or(self.current.as_ref())
            .map_or(0.0, |held| held.seconds)
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), BitframeError> {
        let position = utilities::seconds_to_seek_timestamp(seconds);
        trace!("Seeking capture handle to {seconds:.3}s");
        self.input.seek(position, ..position)?;
        self.decoder.flush();
        self.current = None;
        self.pending = None;
        self.draining = false;
        self.exhausted = false;
        Ok(())
    }

    /// Decode the next frame of the video stream, or `None` at end of stream.
    fn decode_next(&mut self) -> Result<Option<HeldFrame>, BitframeError> {
        loop {
            let mut frame = VideoFrame::empty();
            if self.decoder.receive_frame(&mut frame).is_ok() {
                let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
                return Ok(Some(HeldFrame {
                    seconds: utilities::pts_to_seconds(pts, self.time_base),
                    frame,
                }));
            }
            if self.draining {
                self.exhausted = true;
                return Ok(None);
            }

            let mut next_packet = None;
            for (stream, packet) in self.input.packets() {
                if stream.index() == self.stream_index {
                    next_packet = Some(packet);
                    break;
                }
            }
            match next_packet {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.draining = true;
                }
            }
        }
    }

    fn convert(&mut self, frame: &VideoFrame) -> Result<PixelBuffer, BitframeError> {
        let mut scaled = VideoFrame::empty();
        self.scaler.run(frame, &mut scaled)?;
        let CaptureTarget {
            width,
            height,
            pixel_format,
        } = self.target;
        let scaled_format = scaler_format(pixel_format);
        let mut data =
            utilities::frame_to_buffer(&scaled, width, height, scaled_format.bytes_per_pixel());
        if scaled_format != pixel_format {
            data = codec::luminance_plane(&data, scaled_format.bytes_per_pixel());
        }
        PixelBuffer::new(width, height, pixel_format, data)
    }
}

/// Format the scaler produces for a target format.
///
/// Gray targets are scaled to RGB and reduced with [`codec::luminance`]:
/// FFmpeg's `GRAY8` output copies limited-range luma, which would
/// threshold differently from the other formats.
fn scaler_format(target: PixelFormat) -> PixelFormat {
    match target {
        PixelFormat::Gray8 => PixelFormat::Rgb8,
        other => other,
    }
}

impl CaptureHandle for VideoCaptureHandle {
    fn seek(&mut self, timestamp: Duration) -> Result<PixelBuffer, BitframeError> {
        let target = timestamp.as_secs_f64();
        let needs_seek = match self.last_target {
            None => target > RESEEK_WINDOW,
            Some(previous) => target < previous || target > self.latest_seconds() + RESEEK_WINDOW,
        };
        if needs_seek {
            self.seek_to(target)?;
        }
        self.last_target = Some(target);

        loop {
            match self.pending.take() {
                Some(held) if held.seconds <= target + PTS_EPSILON => self.current = Some(held),
                Some(held) => {
                    self.pending = Some(held);
                    break;
                }
                None if self.exhausted => break,
                None => self.pending = self.decode_next()?,
            }
        }

        // Before the first frame, show the first frame.
        let from_current = self.current.is_some();
        let Some(held) = self.current.take().or_else(|| self.pending.take()) else {
            return Err(BitframeError::VideoDecodeError(format!(
                "no frame decodable at {target:.3}s"
            )));
        };
        let pixels = self.convert(&held.frame);
        if from_current {
            self.current = Some(held);
        } else {
            self.pending = Some(held);
        }
        pixels
    }
}
