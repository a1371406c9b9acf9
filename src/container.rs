//! Container encodings for packed frame sequences.
//!
//! Every container carries the sequence shape (`width`, `height`, frame
//! count, `fps`, `duration`, `bytesPerFrame`) and the pack settings next to
//! the frame data. The formats are:
//!
//! | Format | Payload |
//! |---|---|
//! | [`Binary`](ContainerFormat::Binary) | frames concatenated, metadata in the file name |
//! | [`BinaryGzip`](ContainerFormat::BinaryGzip) | the same bytes, gzip compressed |
//! | [`JsonHex`](ContainerFormat::JsonHex) | JSON, one lowercase hex string per frame |
//! | [`JsonBase64`](ContainerFormat::JsonBase64) | JSON, one base64 string per frame, `"encoding": "base64"` |
//! | [`JsonBase64Gzip`](ContainerFormat::JsonBase64Gzip) | the base64 document, gzip compressed |
//! | [`CHeader`](ContainerFormat::CHeader) | Arduino header with a `PROGMEM` array |
//!
//! Writing a gzip format in a build without the `gzip` feature produces the
//! uncompressed sibling instead; [`EncodedContainer::format`] reports what
//! was actually written. [`decode_container`] sniffs the gzip magic before
//! anything else, so callers never need to know how a file was compressed.
//!
//! # Example
//!
//! ```no_run
//! use bitframe::container::{self, ContainerFormat, ExportMeta};
//! # fn demo(sequence: &bitframe::FrameSequence) -> Result<(), bitframe::BitframeError> {
//! let meta = ExportMeta::new("clip.mp4", sequence.meta(), 128, false);
//! let encoded = container::export(ContainerFormat::BinaryGzip, sequence.frames(), &meta)?;
//! let name = container::export_file_name("clip", &meta, encoded.format);
//! std::fs::write(name, &encoded.bytes)?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::fmt::{Display, Formatter, Result as FmtResult, Write as _};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::codec::{PACKING_DESCRIPTION, PackedFrame, bytes_per_frame};
use crate::error::BitframeError;
use crate::ingest::Dimensions;
use crate::metadata::RenderMeta;
use crate::sequence::{FrameSequence, PackSettings};

/// Two-byte prefix of every gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Title written into containers when none is given.
pub const DEFAULT_TITLE: &str = "bitframe";

const BASE64_ENCODING: &str = "base64";

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Concatenated raw frames.
    Binary,
    /// Concatenated raw frames, gzip compressed.
    BinaryGzip,
    /// JSON with hex-encoded frames.
    JsonHex,
    /// JSON with base64-encoded frames.
    JsonBase64,
    /// JSON with base64-encoded frames, gzip compressed.
    JsonBase64Gzip,
    /// Arduino-compatible C header.
    CHeader,
}

impl ContainerFormat {
    /// All formats, in the order they are listed to users.
    pub const ALL: [ContainerFormat; 6] = [
        ContainerFormat::Binary,
        ContainerFormat::BinaryGzip,
        ContainerFormat::JsonHex,
        ContainerFormat::JsonBase64,
        ContainerFormat::JsonBase64Gzip,
        ContainerFormat::CHeader,
    ];

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Binary => "bin",
            ContainerFormat::BinaryGzip => "bin.gz",
            ContainerFormat::JsonHex => "json",
            ContainerFormat::JsonBase64 => "base64.json",
            ContainerFormat::JsonBase64Gzip => "base64.json.gz",
            ContainerFormat::CHeader => "h",
        }
    }

    /// Whether the payload is gzip compressed.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            ContainerFormat::BinaryGzip | ContainerFormat::JsonBase64Gzip
        )
    }

    /// The same format without compression.
    pub fn uncompressed_sibling(self) -> Self {
        match self {
            ContainerFormat::BinaryGzip => ContainerFormat::Binary,
            ContainerFormat::JsonBase64Gzip => ContainerFormat::JsonBase64,
            other => other,
        }
    }

    /// Parse a user-facing format name (`bin`, `bin.gz`, `json`, `base64`, ...).
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "bin" | "binary" => Some(ContainerFormat::Binary),
            "bin.gz" | "binary-gzip" | "gz" => Some(ContainerFormat::BinaryGzip),
            "json" | "hex" | "json-hex" => Some(ContainerFormat::JsonHex),
            "base64" | "base64.json" | "json-base64" => Some(ContainerFormat::JsonBase64),
            "base64.json.gz" | "json-base64-gzip" | "base64-gzip" => {
                Some(ContainerFormat::JsonBase64Gzip)
            }
            "h" | "header" | "c-header" => Some(ContainerFormat::CHeader),
            _ => None,
        }
    }

    /// Infer the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        // Longest extensions first so `.base64.json` wins over `.json`.
        let mut formats = Self::ALL;
        formats.sort_by_key(|format| std::cmp::Reverse(format.extension().len()));
        formats
            .into_iter()
            .find(|format| name.ends_with(&format!(".{}", format.extension())))
    }
}

impl Display for ContainerFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ContainerFormat::Binary => "binary",
            ContainerFormat::BinaryGzip => "binary-gzip",
            ContainerFormat::JsonHex => "json-hex",
            ContainerFormat::JsonBase64 => "json-base64",
            ContainerFormat::JsonBase64Gzip => "json-base64-gzip",
            ContainerFormat::CHeader => "c-header",
        };
        f.write_str(name)
    }
}

/// Metadata written alongside exported frames.
///
/// Serializes with the camelCase keys every shipped decoder reads
/// (`bytesPerFrame`, `frames`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    /// Free-form title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Name of the source the frames were rendered from.
    #[serde(default)]
    pub source: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Number of frames.
    #[serde(rename = "frames", alias = "frameCount")]
    pub frame_count: u64,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Frames per second, rounded to three decimals.
    #[serde(default)]
    pub fps: f64,
    /// Luminance threshold used when packing.
    #[serde(default)]
    pub threshold: u8,
    /// Whether on and off were swapped when packing.
    #[serde(default)]
    pub invert: bool,
    /// Packed bytes per frame.
    pub bytes_per_frame: usize,
    /// Packing layout description.
    #[serde(default = "default_packing")]
    pub packing: String,
    /// Frame encoding inside JSON. Absent means hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_owned()
}

fn default_packing() -> String {
    PACKING_DESCRIPTION.to_owned()
}

impl ExportMeta {
    /// Snapshot a render's metadata for export.
    pub fn new(source: impl Into<String>, meta: &RenderMeta, threshold: u8, invert: bool) -> Self {
        Self {
            title: default_title(),
            source: source.into(),
            width: meta.width,
            height: meta.height,
            frame_count: meta.frame_count,
            duration: meta.duration,
            fps: (meta.fps * 1000.0).round() / 1000.0,
            threshold,
            invert,
            bytes_per_frame: meta.bytes_per_frame,
            packing: default_packing(),
            encoding: None,
        }
    }

    /// Snapshot a sequence, using its recorded pack settings when present.
    pub fn from_sequence(source: impl Into<String>, sequence: &FrameSequence) -> Self {
        let packing = sequence.packing().unwrap_or(PackSettings {
            threshold: 128,
            invert: false,
        });
        Self::new(source, sequence.meta(), packing.threshold, packing.invert)
    }

    /// Replace the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

#[derive(Serialize)]
struct JsonDocumentRef<'a> {
    #[serde(flatten)]
    meta: &'a ExportMeta,
    data: Vec<String>,
}

#[derive(Deserialize)]
struct JsonDocument {
    #[serde(flatten)]
    meta: ExportMeta,
    #[serde(default)]
    data: Vec<String>,
}

/// Bytes of an exported container and the format they are in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContainer {
    /// Format actually produced. May differ from the requested one when a
    /// gzip format fell back.
    pub format: ContainerFormat,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
}

/// Result of [`decode_container`].
#[derive(Debug, Clone)]
pub struct DecodedContainer {
    /// Embedded metadata. `None` for raw binary payloads.
    pub meta: Option<ExportMeta>,
    /// Decoded frames.
    pub sequence: FrameSequence,
}

/// Concatenate frames into one raw buffer.
pub fn to_binary(frames: &[PackedFrame]) -> Vec<u8> {
    let total = frames.iter().map(PackedFrame::len).sum();
    let mut bytes = Vec::with_capacity(total);
    for frame in frames {
        bytes.extend_from_slice(frame.as_bytes());
    }
    bytes
}

/// Concatenate frames and gzip the result.
///
/// Without the `gzip` feature this logs a warning and returns
/// [`ContainerFormat::Binary`].
pub fn to_binary_gzip(frames: &[PackedFrame]) -> Result<EncodedContainer, BitframeError> {
    compress_or_fall_back(ContainerFormat::BinaryGzip, to_binary(frames))
}

/// Encode frames as a JSON document of hex strings.
pub fn to_json_hex(frames: &[PackedFrame], meta: &ExportMeta) -> Result<String, BitframeError> {
    let meta = ExportMeta {
        encoding: None,
        ..meta.clone()
    };
    let data = frames.iter().map(|frame| hex::encode(frame.as_bytes())).collect();
    Ok(serde_json::to_string(&JsonDocumentRef { meta: &meta, data })?)
}

/// Encode frames as a JSON document of base64 strings.
pub fn to_json_base64(frames: &[PackedFrame], meta: &ExportMeta) -> Result<String, BitframeError> {
    let meta = ExportMeta {
        encoding: Some(BASE64_ENCODING.to_owned()),
        ..meta.clone()
    };
    let data = frames
        .iter()
        .map(|frame| BASE64.encode(frame.as_bytes()))
        .collect();
    Ok(serde_json::to_string(&JsonDocumentRef { meta: &meta, data })?)
}

/// Encode frames as a base64 JSON document and gzip the whole document.
///
/// Without the `gzip` feature this logs a warning and returns
/// [`ContainerFormat::JsonBase64`].
pub fn to_json_base64_gzip(
    frames: &[PackedFrame],
    meta: &ExportMeta,
) -> Result<EncodedContainer, BitframeError> {
    let json = to_json_base64(frames, meta)?;
    compress_or_fall_back(ContainerFormat::JsonBase64Gzip, json.into_bytes())
}

/// Render frames as an Arduino C header.
///
/// Macro names are prefixed with the upper-cased title, so the default
/// title yields `BITFRAME_WIDTH`, `BITFRAME_FRAMES_DATA`, and so on.
pub fn to_c_header(frames: &[PackedFrame], meta: &ExportMeta) -> String {
    let bytes = to_binary(frames);
    let mut header = String::with_capacity(bytes.len() * 6 + 256);
    // Formatting into a `String` only fails if a `Display` impl does.
    write_c_header(&mut header, &header_prefix(&meta.title), meta, frames.len(), &bytes)
        .unwrap_or_default();
    header
}

fn write_c_header(
    header: &mut String,
    prefix: &str,
    meta: &ExportMeta,
    frame_count: usize,
    bytes: &[u8],
) -> FmtResult {
    header.push_str("#pragma once\n#include <Arduino.h>\n\n");
    writeln!(header, "#define {prefix}_WIDTH {}", meta.width)?;
    writeln!(header, "#define {prefix}_HEIGHT {}", meta.height)?;
    writeln!(header, "#define {prefix}_FRAMES {frame_count}")?;
    writeln!(header, "#define {prefix}_BYTES_PER_FRAME {}", meta.bytes_per_frame)?;
    header.push('\n');
    writeln!(header, "const uint8_t {prefix}_FRAMES_DATA[] PROGMEM = {{")?;
    for line in bytes.chunks(16) {
        header.push_str("  ");
        for byte in line {
            write!(header, "0x{byte:02x}, ")?;
        }
        header.truncate(header.trim_end().len());
        header.push('\n');
    }
    header.push_str("};\n");
    Ok(())
}

fn header_prefix(title: &str) -> String {
    let mut prefix: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if prefix.trim_matches('_').is_empty() {
        return DEFAULT_TITLE.to_ascii_uppercase();
    }
    if prefix.starts_with(|c: char| c.is_ascii_digit()) {
        prefix.insert(0, '_');
    }
    prefix
}

/// Encode frames in any container format.
pub fn export(
    format: ContainerFormat,
    frames: &[PackedFrame],
    meta: &ExportMeta,
) -> Result<EncodedContainer, BitframeError> {
    let encoded = match format {
        ContainerFormat::Binary => EncodedContainer {
            format,
            bytes: to_binary(frames),
        },
        ContainerFormat::BinaryGzip => to_binary_gzip(frames)?,
        ContainerFormat::JsonHex => EncodedContainer {
            format,
            bytes: to_json_hex(frames, meta)?.into_bytes(),
        },
        ContainerFormat::JsonBase64 => EncodedContainer {
            format,
            bytes: to_json_base64(frames, meta)?.into_bytes(),
        },
        ContainerFormat::JsonBase64Gzip => to_json_base64_gzip(frames, meta)?,
        ContainerFormat::CHeader => EncodedContainer {
            format,
            bytes: to_c_header(frames, meta).into_bytes(),
        },
    };
    debug!(
        "Exported {} frames as {} ({} bytes)",
        frames.len(),
        encoded.format,
        encoded.bytes.len()
    );
    Ok(encoded)
}

/// File name that carries the sequence shape: `{stem}-{w}x{h}@{fps}.{ext}`.
///
/// `fps` is rounded to the nearest integer, matching what
/// [`parse_file_name`](crate::ingest::parse_file_name) reads back.
pub fn export_file_name(stem: &str, meta: &ExportMeta, format: ContainerFormat) -> String {
    format!(
        "{stem}-{}x{}@{}.{}",
        meta.width,
        meta.height,
        meta.fps.round() as u64,
        format.extension()
    )
}

/// Returns `true` if `bytes` starts with the gzip magic.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompress `bytes` if they are gzip, otherwise borrow them unchanged.
///
/// # Errors
///
/// - [`BitframeError::UnsupportedCapability`] for gzip input in a build
///   without the `gzip` feature.
/// - [`BitframeError::IoError`] for a corrupt gzip stream.
pub fn decompress_if_gzip(bytes: &[u8]) -> Result<Cow<'_, [u8]>, BitframeError> {
    if !is_gzip(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }
    gzip_decompress(bytes).map(Cow::Owned)
}

#[cfg(feature = "gzip")]
fn gzip_decompress(bytes: &[u8]) -> Result<Vec<u8>, BitframeError> {
    use std::io::Read;

    let mut output = Vec::with_capacity(bytes.len() * 4);
    flate2::read::GzDecoder::new(bytes).read_to_end(&mut output)?;
    Ok(output)
}

#[cfg(not(feature = "gzip"))]
fn gzip_decompress(_bytes: &[u8]) -> Result<Vec<u8>, BitframeError> {
    Err(BitframeError::UnsupportedCapability(
        "input is gzip compressed but this build lacks the `gzip` feature".to_owned(),
    ))
}

/// Gzip `bytes` with the default compression level.
#[cfg(feature = "gzip")]
pub fn gzip_compress(bytes: &[u8]) -> Result<Vec<u8>, BitframeError> {
    use std::io::Write;

    let mut encoder = flate2::write::GzEncoder::new(
        Vec::with_capacity(bytes.len() / 2),
        flate2::Compression::default(),
    );
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(feature = "gzip")]
fn compress_or_fall_back(
    format: ContainerFormat,
    bytes: Vec<u8>,
) -> Result<EncodedContainer, BitframeError> {
    Ok(EncodedContainer {
        format,
        bytes: gzip_compress(&bytes)?,
    })
}

#[cfg(not(feature = "gzip"))]
fn compress_or_fall_back(
    format: ContainerFormat,
    bytes: Vec<u8>,
) -> Result<EncodedContainer, BitframeError> {
    let fallback = format.uncompressed_sibling();
    warn!("gzip support not compiled in, writing {fallback} instead of {format}");
    Ok(EncodedContainer {
        format: fallback,
        bytes,
    })
}

/// Decode any container produced by [`export`] (except the C header).
///
/// Gzip is detected by its magic and removed first. A payload whose first
/// non-whitespace byte is `{` is parsed as JSON. When `dimensions` are
/// given, a payload that only looks like JSON (a packed row can start with
/// `0x7B`) but does not parse as a container document is decoded as raw
/// binary instead. Anything else is raw binary and needs `dimensions`
/// (typically from
/// [`parse_file_name`](crate::ingest::parse_file_name)).
///
/// # Errors
///
/// - [`BitframeError::Json`] for malformed JSON when no `dimensions` are
///   given.
/// - [`BitframeError::DecodeError`] naming `bytesPerFrame` when it does not
///   match the dimensions, `data[i]` for a frame of the wrong length or
///   with bad encoding, and `width` for raw binary without dimensions.
pub fn decode_container(
    bytes: &[u8],
    dimensions: Option<Dimensions>,
) -> Result<DecodedContainer, BitframeError> {
    let payload = decompress_if_gzip(bytes)?;
    let is_json = payload
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| *byte == b'{');

    if is_json {
        match serde_json::from_slice::<JsonDocument>(&payload) {
            Ok(document) => return decode_json(document),
            Err(error) if dimensions.is_none() => return Err(error.into()),
            Err(error) => debug!("Payload is not a JSON container ({error}), decoding as binary"),
        }
    }

    let Some(dimensions) = dimensions else {
        return Err(BitframeError::decode(
            "width",
            "raw binary carries no dimensions; pass them explicitly or via a WIDTHxHEIGHT@FPS file name",
        ));
    };
    let sequence = FrameSequence::from_flat(
        &payload,
        dimensions.width,
        dimensions.height,
        None,
        dimensions.fps,
    )?;
    Ok(DecodedContainer {
        meta: None,
        sequence,
    })
}

fn decode_json(document: JsonDocument) -> Result<DecodedContainer, BitframeError> {
    let JsonDocument { meta, data } = document;
    if meta.width == 0 || meta.height == 0 {
        return Err(BitframeError::InvalidDimensions {
            width: meta.width,
            height: meta.height,
        });
    }

    let expected = bytes_per_frame(meta.width, meta.height);
    if meta.bytes_per_frame != expected {
        return Err(BitframeError::decode(
            "bytesPerFrame",
            format!(
                "{} does not match {}x{} ({expected} bytes per frame)",
                meta.bytes_per_frame, meta.width, meta.height
            ),
        ));
    }

    let base64 = meta.encoding.as_deref() == Some(BASE64_ENCODING);
    let mut frames = Vec::with_capacity(data.len());
    for (index, text) in data.iter().enumerate() {
        let field = || format!("data[{index}]");
        let bytes = if base64 {
            BASE64
                .decode(text)
                .map_err(|e| BitframeError::decode(field(), e.to_string()))?
        } else {
            hex::decode(text).map_err(|e| BitframeError::decode(field(), e.to_string()))?
        };
        if bytes.len() != expected {
            return Err(BitframeError::decode(
                field(),
                format!("{} bytes, expected {expected}", bytes.len()),
            ));
        }
        frames.push(PackedFrame::from_vec_unchecked(bytes));
    }

    if meta.frame_count != frames.len() as u64 {
        warn!(
            "Container declares {} frames but holds {}",
            meta.frame_count,
            frames.len()
        );
    }

    let render_meta = RenderMeta::new(
        meta.width,
        meta.height,
        meta.duration,
        frames.len() as u64,
        meta.fps,
    );
    let sequence = FrameSequence::from_parts(render_meta, frames, None).with_packing(PackSettings {
        threshold: meta.threshold,
        invert: meta.invert,
    });
    Ok(DecodedContainer {
        meta: Some(meta),
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_prefix_sanitizes_title() {
        assert_eq!(header_prefix("bitframe"), "BITFRAME");
        assert_eq!(header_prefix("bad apple"), "BAD_APPLE");
        assert_eq!(header_prefix("8bit"), "_8BIT");
        assert_eq!(header_prefix("--"), "BITFRAME");
    }

    #[test]
    fn format_from_file_name_prefers_longest_extension() {
        assert_eq!(
            ContainerFormat::from_file_name("clip.base64.json.gz"),
            Some(ContainerFormat::JsonBase64Gzip)
        );
        assert_eq!(
            ContainerFormat::from_file_name("clip.base64.json"),
            Some(ContainerFormat::JsonBase64)
        );
        assert_eq!(
            ContainerFormat::from_file_name("clip-8x8@30.bin.gz"),
            Some(ContainerFormat::BinaryGzip)
        );
        assert_eq!(ContainerFormat::from_file_name("clip.json"), Some(ContainerFormat::JsonHex));
        assert_eq!(ContainerFormat::from_file_name("clip.mp4"), None);
    }
}
