//! Internal utility functions.
//!
//! Helpers for pixel-data copying and timestamp conversion shared by the
//! FFmpeg-backed source.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Microseconds per second, FFmpeg's `AV_TIME_BASE`.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Copy plane 0 of an FFmpeg video frame into a tightly packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
/// This function strips that padding.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = width as usize * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * height as usize);
        for row in 0..height as usize {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Container-level seek position (`AV_TIME_BASE` units) for a time in seconds.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * AV_TIME_BASE) as i64
}

/// Convert a stream duration in time base units to a [`Duration`].
pub(crate) fn stream_duration(duration: i64, time_base: Rational) -> Duration {
    if duration <= 0 || time_base.denominator() == 0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(pts_to_seconds(duration, time_base).max(0.0)).unwrap_or_default()
}

/// Frames per second from a rational rate, or `None` if undefined.
pub(crate) fn rational_to_fps(rate: Rational) -> Option<f64> {
    (rate.denominator() != 0 && rate.numerator() > 0)
        .then(|| rate.numerator() as f64 / rate.denominator() as f64)
}
