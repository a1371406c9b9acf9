//! The bitstream codec.
//!
//! Every packed frame in the crate uses the same layout: rows top to bottom,
//! eight horizontal pixels per byte, most significant bit first, and each
//! row starting on a fresh byte (the tail of a row is zero-padded). An on
//! (white) pixel is a `1` bit.
//!
//! ```
//! use bitframe::{PixelBuffer, PixelFormat, codec};
//!
//! // 4x1 image: white, black, white, white.
//! let pixels = PixelBuffer::new(4, 1, PixelFormat::Gray8, vec![255, 0, 255, 255])?;
//! let packed = codec::pack(&pixels, 128, false);
//! assert_eq!(packed.as_bytes(), &[0b1011_0000]);
//! # Ok::<(), bitframe::BitframeError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;
use crate::error::BitframeError;

/// Human-readable packing description embedded in every exported container.
pub const PACKING_DESCRIPTION: &str = "row-major, MSB-first per byte, padded to next byte per row";

/// Number of packed bytes in one row of `width` pixels.
pub fn bytes_per_row(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Number of packed bytes in one `width` x `height` frame.
pub fn bytes_per_frame(width: u32, height: u32) -> usize {
    bytes_per_row(width) * height as usize
}

/// ITU-R BT.601 luminance, `0.299R + 0.587G + 0.114B`, floored.
///
/// For an integer threshold `t`, `luminance(..) >= t` holds exactly when the
/// real-valued luminance is `>= t`.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// One [`luminance`] sample per pixel of interleaved RGB or RGBA `data`.
pub(crate) fn luminance_plane(data: &[u8], bytes_per_pixel: usize) -> Vec<u8> {
    data.chunks_exact(bytes_per_pixel)
        .map(|pixel| luminance(pixel[0], pixel[1], pixel[2]))
        .collect()
}

/// A raw, tightly packed frame of pixels.
///
/// Produced by a capture handle and consumed (by move) by the packer. The
/// length of the data always equals `width * height * bytes_per_pixel`.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Debug for PixelBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Wrap raw pixel data, validating its length.
    ///
    /// # Errors
    ///
    /// - [`BitframeError::InvalidDimensions`] if either dimension is zero.
    /// - [`BitframeError::PixelBufferMismatch`] if `data` is not exactly
    ///   `width * height * format.bytes_per_pixel()` bytes.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, BitframeError> {
        if width == 0 || height == 0 {
            return Err(BitframeError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(BitframeError::PixelBufferMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A buffer where every pixel has the same value.
    ///
    /// `pixel` must hold `format.bytes_per_pixel()` bytes.
    pub fn filled(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel: &[u8],
    ) -> Result<Self, BitframeError> {
        if pixel.len() != format.bytes_per_pixel() {
            return Err(BitframeError::PixelBufferMismatch {
                expected: format.bytes_per_pixel(),
                actual: pixel.len(),
            });
        }
        let count = width as usize * height as usize;
        Self::new(width, height, format, pixel.repeat(count))
    }

    /// Convert a decoded image into a buffer of the requested format.
    pub fn from_image(image: &DynamicImage, format: PixelFormat) -> Result<Self, BitframeError> {
        let (width, height) = (image.width(), image.height());
        let data = match format {
            PixelFormat::Rgb8 => image.to_rgb8().into_raw(),
            PixelFormat::Rgba8 => image.to_rgba8().into_raw(),
            PixelFormat::Gray8 => match image {
                DynamicImage::ImageLuma8(gray) => gray.as_raw().clone(),
                // `to_luma8` weighs channels with Rec. 709; keep the packer's weights.
                other => luminance_plane(other.to_rgba8().as_raw(), 4),
            },
        };
        Self::new(width, height, format, data)
    }

    /// View this buffer as an [`image::DynamicImage`].
    pub fn to_image(&self) -> Result<DynamicImage, BitframeError> {
        let (width, height, data) = (self.width, self.height, self.data.clone());
        let image = match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
            }
            PixelFormat::Gray8 => {
                GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
            }
        };
        image.ok_or(BitframeError::PixelBufferMismatch {
            expected: width as usize * height as usize * self.format.bytes_per_pixel(),
            actual: self.data.len(),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the raw pixel bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Luminance of the pixel at `(x, y)`, or `None` outside the frame.
    pub fn luminance_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        let pixel = &self.data[offset..offset + bpp];
        Some(match self.format {
            PixelFormat::Gray8 => pixel[0],
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => luminance(pixel[0], pixel[1], pixel[2]),
        })
    }
}

/// One bit-packed monochrome frame.
///
/// Immutable once created; its length is always
/// [`bytes_per_frame`]`(width, height)` for the dimensions it was packed
/// or validated against.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackedFrame {
    bytes: Box<[u8]>,
}

impl Debug for PackedFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let preview: String = self
            .bytes
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        f.debug_struct("PackedFrame")
            .field("len", &self.bytes.len())
            .field("head", &preview)
            .finish()
    }
}

impl AsRef<[u8]> for PackedFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PackedFrame {
    /// Wrap bytes produced elsewhere, checking they match the geometry.
    ///
    /// # Errors
    ///
    /// [`BitframeError::DecodeError`] naming `frame` if the length is not
    /// `bytes_per_frame(width, height)`.
    pub fn from_bytes(bytes: Vec<u8>, width: u32, height: u32) -> Result<Self, BitframeError> {
        let expected = bytes_per_frame(width, height);
        if bytes.len() != expected {
            return Err(BitframeError::decode(
                "frame",
                format!(
                    "{} bytes do not form a {width}x{height} frame ({expected} bytes)",
                    bytes.len()
                ),
            ));
        }
        Ok(Self::from_vec_unchecked(bytes))
    }

    pub(crate) fn from_vec_unchecked(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of packed bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a zero-length frame.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take ownership of the packed bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    /// Whether the pixel at `(x, y)` is on.
    pub fn pixel(&self, x: u32, y: u32, width: u32) -> bool {
        get_pixel(&self.bytes, x, y, width)
    }
}

/// Binarize and bit-pack a pixel buffer.
///
/// A pixel is on when its luminance is `>= threshold`, flipped when
/// `invert` is set. Pad bits at the end of each row are always zero.
pub fn pack(pixels: &PixelBuffer, threshold: u8, invert: bool) -> PackedFrame {
    let mut output = vec![0u8; bytes_per_frame(pixels.width, pixels.height)];
    pack_into(pixels, threshold, invert, &mut output);
    PackedFrame::from_vec_unchecked(output)
}

/// Pack into a caller-provided buffer of exactly `bytes_per_frame` bytes.
pub(crate) fn pack_into(pixels: &PixelBuffer, threshold: u8, invert: bool, output: &mut [u8]) {
    debug_assert_eq!(output.len(), bytes_per_frame(pixels.width, pixels.height));
    output.fill(0);

    let row_bytes = bytes_per_row(pixels.width);
    let bpp = pixels.format.bytes_per_pixel();
    let stride = pixels.width as usize * bpp;

    for (y, row) in pixels.data.chunks_exact(stride).enumerate() {
        let out_row = &mut output[y * row_bytes..(y + 1) * row_bytes];
        for (x, pixel) in row.chunks_exact(bpp).enumerate() {
            let value = match pixels.format {
                PixelFormat::Gray8 => pixel[0],
                PixelFormat::Rgb8 | PixelFormat::Rgba8 => luminance(pixel[0], pixel[1], pixel[2]),
            };
            if (value >= threshold) != invert {
                out_row[x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
}

/// Expand packed bytes back into an RGBA8 buffer.
///
/// On pixels become opaque white, off pixels opaque black. Bytes missing
/// from a truncated input read as off.
///
/// # Errors
///
/// [`BitframeError::InvalidDimensions`] if either dimension is zero.
pub fn unpack(bytes: &[u8], width: u32, height: u32) -> Result<PixelBuffer, BitframeError> {
    let luma = unpack_luma(bytes, width, height);
    let mut data = Vec::with_capacity(luma.len() * 4);
    for value in luma {
        data.extend_from_slice(&[value, value, value, 255]);
    }
    PixelBuffer::new(width, height, PixelFormat::Rgba8, data)
}

/// Expand packed bytes into one byte per pixel, `0` or `255`.
pub(crate) fn unpack_luma(bytes: &[u8], width: u32, height: u32) -> Vec<u8> {
    let width = width as usize;
    let row_bytes = width.div_ceil(8);
    let mut luma = Vec::with_capacity(width * height as usize);

    for y in 0..height as usize {
        let row_start = y * row_bytes;
        for column in 0..row_bytes {
            let byte = bytes.get(row_start + column).copied().unwrap_or(0);
            let expanded = &BYTE_TO_LUMA[byte as usize];
            let remaining = (width - column * 8).min(8);
            luma.extend_from_slice(&expanded[..remaining]);
        }
    }
    luma
}

/// Whether pixel `(x, y)` of a single packed frame is on.
///
/// Reads past the end of `frame` return `false`.
pub fn get_pixel(frame: &[u8], x: u32, y: u32, width: u32) -> bool {
    if x >= width {
        return false;
    }
    let index = y as usize * bytes_per_row(width) + x as usize / 8;
    frame
        .get(index)
        .is_some_and(|byte| byte & (0x80 >> (x % 8)) != 0)
}

/// Whether pixel `(x, y)` of frame `frame_index` in a flat buffer of
/// back-to-back frames is on.
pub fn get_pixel_in_sequence(
    data: &[u8],
    frame_index: usize,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> bool {
    if y >= height {
        return false;
    }
    let start = frame_index * bytes_per_frame(width, height);
    data.get(start..)
        .is_some_and(|frame| get_pixel(frame, x, y, width))
}

/// Each byte value expanded to eight `0`/`255` samples, MSB first.
pub(crate) static BYTE_TO_LUMA: [[u8; 8]; 256] = build_byte_table();

const fn build_byte_table() -> [[u8; 8]; 256] {
    let mut table = [[0u8; 8]; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut bit = 0;
        while bit < 8 {
            if byte & (0x80 >> bit) != 0 {
                table[byte][bit] = 255;
            }
            bit += 1;
        }
        byte += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_table_matches_bits() {
        assert_eq!(BYTE_TO_LUMA[0x00], [0; 8]);
        assert_eq!(BYTE_TO_LUMA[0xFF], [255; 8]);
        assert_eq!(BYTE_TO_LUMA[0b1000_0001], [255, 0, 0, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn unpack_luma_trims_row_padding() {
        // 3 pixels wide: only the top three bits of each byte are pixels.
        let luma = unpack_luma(&[0b1010_0000, 0b0110_0000], 3, 2);
        assert_eq!(luma, vec![255, 0, 255, 0, 255, 255]);
    }

    #[test]
    fn unpack_luma_reads_missing_bytes_as_off() {
        let luma = unpack_luma(&[0xFF], 8, 2);
        assert_eq!(&luma[..8], &[255; 8]);
        assert_eq!(&luma[8..], &[0; 8]);
    }
}
