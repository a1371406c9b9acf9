//! Loading previously exported frame files.
//!
//! Raw binary exports carry no header, so their shape has to come from
//! somewhere else: the `WIDTHxHEIGHT@FPS` pattern in the file name, an
//! explicit [`Dimensions`] value, or a guess from
//! [`detect_possible_resolutions`].

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use log::debug;

use crate::codec::bytes_per_frame;
use crate::container::decompress_if_gzip;
use crate::error::BitframeError;

/// Frame shape supplied alongside a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate, when known.
    pub fps: Option<f64>,
}

impl Dimensions {
    /// Dimensions without a known frame rate.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: None,
        }
    }

    /// Attach a frame rate.
    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

/// Read `WIDTHxHEIGHT@FPS` from anywhere in a file name.
///
/// The first occurrence wins; all three numbers are decimal integers.
///
/// ```
/// use bitframe::ingest::parse_file_name;
///
/// let dims = parse_file_name("clip-128x64@30.bin.gz")?;
/// assert_eq!((dims.width, dims.height, dims.fps), (128, 64, Some(30.0)));
/// # Ok::<(), bitframe::BitframeError>(())
/// ```
///
/// # Errors
///
/// [`BitframeError::InvalidFileName`] if no such pattern appears.
pub fn parse_file_name(name: &str) -> Result<Dimensions, BitframeError> {
    let bytes = name.as_bytes();
    (0..bytes.len())
        .find_map(|start| match_pattern(&bytes[start..]))
        .ok_or_else(|| BitframeError::InvalidFileName(name.to_owned()))
}

fn match_pattern(input: &[u8]) -> Option<Dimensions> {
    let (width, rest) = take_number(input)?;
    let rest = rest.strip_prefix(b"x")?;
    let (height, rest) = take_number(rest)?;
    let rest = rest.strip_prefix(b"@")?;
    let (fps, _) = take_number(rest)?;
    Some(Dimensions {
        width,
        height,
        fps: Some(fps as f64),
    })
}

fn take_number(input: &[u8]) -> Option<(u32, &[u8])> {
    let digits = input.iter().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let value = std::str::from_utf8(&input[..digits]).ok()?.parse().ok()?;
    Some((value, &input[digits..]))
}

/// A plausible frame shape for a headerless buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionCandidate {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Aspect ratio label, e.g. `"16:9"`.
    pub aspect_ratio: &'static str,
}

const COMMON_ASPECTS: [(u32, u32, &str); 5] = [
    (16, 9, "16:9"),
    (4, 3, "4:3"),
    (1, 1, "1:1"),
    (3, 4, "3:4"),
    (9, 16, "9:16"),
];

const MAX_CANDIDATES: usize = 10;

/// Guess frame shapes for a headerless buffer of `file_size` bytes.
///
/// Tries common aspect ratios at scales 4 to 120 and keeps shapes that
/// divide the buffer evenly into more than 10 and fewer than 10000 frames.
/// At most ten candidates are returned, grouped by aspect ratio.
pub fn detect_possible_resolutions(file_size: usize) -> Vec<ResolutionCandidate> {
    let mut candidates = Vec::new();
    for (aspect_w, aspect_h, label) in COMMON_ASPECTS {
        for scale in 4..=120 {
            let (width, height) = (aspect_w * scale, aspect_h * scale);
            let frame_len = bytes_per_frame(width, height);
            if file_size % frame_len != 0 {
                continue;
            }
            let frames = file_size / frame_len;
            if frames > 10 && frames < 10_000 {
                candidates.push(ResolutionCandidate {
                    width,
                    height,
                    aspect_ratio: label,
                });
            }
        }
    }
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Undo gzip compression on a loaded buffer, if present.
///
/// # Errors
///
/// See [`decompress_if_gzip`].
pub fn load_binary(bytes: &[u8]) -> Result<Cow<'_, [u8]>, BitframeError> {
    let payload = decompress_if_gzip(bytes)?;
    if let Cow::Owned(ref inflated) = payload {
        debug!("Decompressed {} bytes to {}", bytes.len(), inflated.len());
    }
    Ok(payload)
}

/// Read a file and undo gzip compression, if present.
pub fn load_binary_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, BitframeError> {
    let bytes = fs::read(path.as_ref())?;
    Ok(load_binary(&bytes)?.into_owned())
}

/// Number of whole frames of the given shape in `len` bytes.
pub fn infer_frame_count(len: usize, width: u32, height: u32) -> u64 {
    match bytes_per_frame(width, height) {
        0 => 0,
        frame_len => (len / frame_len) as u64,
    }
}
