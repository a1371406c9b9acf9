//! Frame capture units.
//!
//! A [`FrameCaptureUnit`] owns one [`CaptureHandle`] for one segment and
//! turns timeline positions into pixel buffers of exactly the configured
//! output shape. The handle is released when the unit is dropped.

use std::time::Duration;

use image::imageops::FilterType;
use log::debug;

use crate::codec::PixelBuffer;
use crate::error::BitframeError;
use crate::media::{CaptureHandle, CaptureTarget, MediaSource};

/// Captures still frames for one segment of a render.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use bitframe::{FrameCaptureUnit, MemorySource, PixelBuffer, PixelFormat};
/// use bitframe::media::CaptureTarget;
///
/// let frame = PixelBuffer::filled(8, 8, PixelFormat::Rgb8, &[255, 255, 255])?;
/// let source = MemorySource::new(vec![frame], 1.0)?;
/// let target = CaptureTarget { width: 4, height: 4, pixel_format: PixelFormat::Gray8 };
///
/// let mut unit = FrameCaptureUnit::open(&source, 0, target)?;
/// let pixels = unit.capture(Duration::ZERO)?;
/// assert_eq!((pixels.width(), pixels.height()), (4, 4));
/// assert!(pixels.as_bytes().iter().all(|&v| v == 255));
/// # Ok::<(), bitframe::BitframeError>(())
/// ```
pub struct FrameCaptureUnit {
    segment: usize,
    target: CaptureTarget,
    handle: Box<dyn CaptureHandle>,
    captured: u64,
}

impl FrameCaptureUnit {
    /// Open a capture handle on `source` for `segment`.
    ///
    /// # Errors
    ///
    /// [`BitframeError::CaptureUnavailable`] if the source cannot provide a
    /// handle.
    pub fn open(
        source: &dyn MediaSource,
        segment: usize,
        target: CaptureTarget,
    ) -> Result<Self, BitframeError> {
        let handle =
            source
                .open_handle(target)
                .map_err(|error| BitframeError::CaptureUnavailable {
                    segment,
                    reason: error.to_string(),
                })?;
        debug!("Segment {segment}: capture handle ready on {}", source.describe());
        Ok(Self {
            segment,
            target,
            handle,
            captured: 0,
        })
    }

    /// Capture the frame displayed at `timestamp`.
    ///
    /// The result always has the target width, height and pixel format.
    ///
    /// # Errors
    ///
    /// [`BitframeError::SeekError`] if the handle fails to produce a frame.
    pub fn capture(&mut self, timestamp: Duration) -> Result<PixelBuffer, BitframeError> {
        let seek_error = |error: BitframeError| BitframeError::SeekError {
            segment: self.segment,
            timestamp,
            reason: error.to_string(),
        };
        let pixels = self.handle.seek(timestamp).map_err(seek_error)?;
        let pixels = conform(pixels, self.target).map_err(seek_error)?;
        self.captured += 1;
        Ok(pixels)
    }

    /// Segment this unit serves.
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// Number of frames captured so far.
    pub fn captured(&self) -> u64 {
        self.captured
    }
}

impl Drop for FrameCaptureUnit {
    fn drop(&mut self) {
        debug!(
            "Segment {}: released capture handle after {} frames",
            self.segment, self.captured
        );
    }
}

/// Resize and convert `pixels` to match `target`, if they do not already.
pub(crate) fn conform(
    pixels: PixelBuffer,
    target: CaptureTarget,
) -> Result<PixelBuffer, BitframeError> {
    let same_size = pixels.width() == target.width && pixels.height() == target.height;
    if same_size && pixels.format() == target.pixel_format {
        return Ok(pixels);
    }

    let mut image = pixels.to_image()?;
    if !same_size {
        image = image.resize_exact(target.width, target.height, FilterType::Triangle);
    }
    PixelBuffer::from_image(&image, target.pixel_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::PixelFormat;

    #[test]
    fn conform_keeps_matching_buffers() {
        let pixels = PixelBuffer::filled(2, 2, PixelFormat::Rgba8, &[1, 2, 3, 255]).unwrap();
        let target = CaptureTarget {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Rgba8,
        };
        assert_eq!(conform(pixels.clone(), target).unwrap(), pixels);
    }

    #[test]
    fn conform_converts_format() {
        let pixels = PixelBuffer::filled(2, 1, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
        let target = CaptureTarget {
            width: 2,
            height: 1,
            pixel_format: PixelFormat::Rgba8,
        };
        let converted = conform(pixels, target).unwrap();
        assert_eq!(converted.as_bytes(), &[0, 0, 0, 255, 0, 0, 0, 255]);
    }
}
