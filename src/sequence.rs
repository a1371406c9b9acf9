//! Ordered packed-frame sequences.

use log::debug;

use crate::codec::{PackedFrame, bytes_per_frame};
use crate::error::BitframeError;
use crate::metadata::RenderMeta;

/// Frame rate assumed for ingested sequences whose rate is unknown.
pub const DEFAULT_INGEST_FPS: f64 = 30.0;

/// Threshold and inversion a sequence was packed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSettings {
    /// Luminance threshold.
    pub threshold: u8,
    /// Whether on and off were swapped.
    pub invert: bool,
}

/// A complete, index-ordered sequence of packed frames.
///
/// Produced by a render or by ingesting an exported file. Every frame has
/// exactly `meta.bytes_per_frame` bytes and `meta.frame_count` equals the
/// number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    meta: RenderMeta,
    frames: Vec<PackedFrame>,
    packing: Option<PackSettings>,
}

impl FrameSequence {
    /// Assemble a sequence from frames already validated against `meta`.
    pub(crate) fn from_parts(
        mut meta: RenderMeta,
        frames: Vec<PackedFrame>,
        packing: Option<PackSettings>,
    ) -> Self {
        meta.frame_count = frames.len() as u64;
        Self {
            meta,
            frames,
            packing,
        }
    }

    /// Build a sequence from frames, checking each frame's length.
    ///
    /// `meta.frame_count` is overwritten with `frames.len()`.
    ///
    /// # Errors
    ///
    /// [`BitframeError::DecodeError`] naming `data[i]` for the first frame
    /// whose length is not `meta.bytes_per_frame`.
    pub fn new(meta: RenderMeta, frames: Vec<PackedFrame>) -> Result<Self, BitframeError> {
        let expected = bytes_per_frame(meta.width, meta.height);
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.len() != expected)
        {
            return Err(BitframeError::decode(
                format!("data[{index}]"),
                format!("{} bytes, expected {expected}", frame.len()),
            ));
        }
        Ok(Self::from_parts(meta, frames, None))
    }

    /// Slice a flat buffer of back-to-back frames.
    ///
    /// When `frame_count` is `None` it is inferred as
    /// `floor(len / bytes_per_frame)`; trailing bytes that do not form a
    /// whole frame are ignored. `fps` defaults to 30 and the duration is
    /// derived from it.
    ///
    /// # Errors
    ///
    /// - [`BitframeError::InvalidDimensions`] if either dimension is zero.
    /// - [`BitframeError::DecodeError`] naming `data` if the buffer is
    ///   shorter than `frame_count` frames.
    pub fn from_flat(
        bytes: &[u8],
        width: u32,
        height: u32,
        frame_count: Option<u64>,
        fps: Option<f64>,
    ) -> Result<Self, BitframeError> {
        if width == 0 || height == 0 {
            return Err(BitframeError::InvalidDimensions { width, height });
        }
        let frame_len = bytes_per_frame(width, height);
        let available = (bytes.len() / frame_len) as u64;
        let count = frame_count.unwrap_or(available);
        if count > available {
            return Err(BitframeError::decode(
                "data",
                format!("{} bytes hold {available} frames, {count} requested", bytes.len()),
            ));
        }
        if bytes.len() % frame_len != 0 && frame_count.is_none() {
            debug!(
                "Ignoring {} trailing bytes after {available} frames",
                bytes.len() % frame_len
            );
        }

        let fps = fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(DEFAULT_INGEST_FPS);
        let frames = bytes
            .chunks_exact(frame_len)
            .take(count as usize)
            .map(|chunk| PackedFrame::from_vec_unchecked(chunk.to_vec()))
            .collect();
        let meta = RenderMeta::new(width, height, count as f64 / fps, count, fps);
        Ok(Self::from_parts(meta, frames, None))
    }

    /// Record the threshold and inversion the frames were packed with.
    #[must_use]
    pub fn with_packing(mut self, packing: PackSettings) -> Self {
        self.packing = Some(packing);
        self
    }

    /// Sequence metadata.
    pub fn meta(&self) -> &RenderMeta {
        &self.meta
    }

    /// Pack settings, when known.
    pub fn packing(&self) -> Option<PackSettings> {
        self.packing
    }

    /// Frames in index order.
    pub fn frames(&self) -> &[PackedFrame] {
        &self.frames
    }

    /// The frame at `index`.
    pub fn frame(&self, index: usize) -> Option<&PackedFrame> {
        self.frames.get(index)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` when the sequence holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.meta.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    /// Take the frames, dropping the metadata.
    pub fn into_frames(self) -> Vec<PackedFrame> {
        self.frames
    }

    /// All frames concatenated into one buffer.
    pub fn to_flat(&self) -> Vec<u8> {
        let mut flat = Vec::with_capacity(self.frames.len() * self.meta.bytes_per_frame);
        for frame in &self.frames {
            flat.extend_from_slice(frame.as_bytes());
        }
        flat
    }
}
