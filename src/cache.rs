//! Playback cache.
//!
//! Players decode packed frames into displayable bitmaps. When memory
//! allows, [`PlaybackCache::build`] decodes every frame up front (in
//! parallel with the `rayon` feature) so playback only copies pixels;
//! otherwise [`Playback`] decodes the requested frame on demand.

use std::borrow::Cow;
use std::time::Duration;

use image::GrayImage;
use log::debug;

use crate::codec::{PackedFrame, unpack_luma};
use crate::error::BitframeError;
use crate::sequence::{DEFAULT_INGEST_FPS, FrameSequence};

/// A decoded monochrome frame. Every sample is `0` or `255`.
pub type Bitmap = GrayImage;

/// Default memory budget for a cache, 512 MiB.
pub const DEFAULT_CACHE_BUDGET: usize = 512 * 1024 * 1024;

/// Settings for [`PlaybackCache::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    max_bytes: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_CACHE_BUDGET,
        }
    }
}

impl CacheOptions {
    /// Options with the default budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest number of bitmap bytes the cache may hold.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// The memory budget in bytes.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Every frame of a sequence decoded to a [`Bitmap`], in order.
#[derive(Debug, Clone)]
pub struct PlaybackCache {
    bitmaps: Vec<Bitmap>,
}

impl PlaybackCache {
    /// Decode all `frames` of `width` x `height` pixels.
    ///
    /// Returns `None` when there are no frames or when the bitmaps would
    /// exceed the memory budget; callers then decode on demand.
    pub fn build(
        frames: &[PackedFrame],
        width: u32,
        height: u32,
        options: &CacheOptions,
    ) -> Option<Self> {
        if frames.is_empty() || width == 0 || height == 0 {
            return None;
        }
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(frames.len()))?;
        if required > options.max_bytes {
            debug!(
                "Playback cache needs {required} bytes, budget is {}; decoding on demand",
                options.max_bytes
            );
            return None;
        }

        let bitmaps = decode_all(frames, width, height);
        debug!("Playback cache built: {} frames, {required} bytes", bitmaps.len());
        Some(Self { bitmaps })
    }

    /// The bitmap for frame `index`.
    pub fn get(&self, index: usize) -> Option<&Bitmap> {
        self.bitmaps.get(index)
    }

    /// Number of cached frames.
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    /// Returns `true` if no frames are cached.
    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    /// Bytes held by the bitmaps.
    pub fn memory_bytes(&self) -> usize {
        self.bitmaps.iter().map(|bitmap| bitmap.as_raw().len()).sum()
    }
}

#[cfg(feature = "rayon")]
fn decode_all(frames: &[PackedFrame], width: u32, height: u32) -> Vec<Bitmap> {
    use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

    frames
        .par_iter()
        .map(|frame| decode_bitmap(frame.as_bytes(), width, height))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn decode_all(frames: &[PackedFrame], width: u32, height: u32) -> Vec<Bitmap> {
    frames
        .iter()
        .map(|frame| decode_bitmap(frame.as_bytes(), width, height))
        .collect()
}

/// Decode one packed frame. Missing bytes read as off.
pub fn decode_bitmap(frame: &[u8], width: u32, height: u32) -> Bitmap {
    GrayImage::from_raw(width, height, unpack_luma(frame, width, height))
        .unwrap_or_else(|| GrayImage::new(width, height))
}

/// Looping playback over a sequence.
///
/// # Example
///
/// ```
/// use bitframe::{CacheOptions, FrameSequence, Playback};
///
/// // Two 8x1 frames: all off, then all on.
/// let sequence = FrameSequence::from_flat(&[0x00, 0xFF], 8, 1, None, Some(2.0))?;
/// let mut playback = Playback::new(sequence, &CacheOptions::new());
///
/// assert_eq!(playback.current()?.get_pixel(0, 0).0, [0]);
/// playback.advance();
/// assert_eq!(playback.current()?.get_pixel(0, 0).0, [255]);
/// playback.advance();
/// assert_eq!(playback.position(), 0);
/// # Ok::<(), bitframe::BitframeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Playback {
    sequence: FrameSequence,
    cache: Option<PlaybackCache>,
    position: usize,
}

impl Playback {
    /// Start playback at frame 0, building a cache if the budget allows.
    pub fn new(sequence: FrameSequence, options: &CacheOptions) -> Self {
        let cache = PlaybackCache::build(
            sequence.frames(),
            sequence.width(),
            sequence.height(),
            options,
        );
        Self {
            sequence,
            cache,
            position: 0,
        }
    }

    /// The bitmap for frame `index`, from the cache when present.
    ///
    /// # Errors
    ///
    /// [`BitframeError::FrameOutOfRange`] past the last frame.
    pub fn frame(&self, index: usize) -> Result<Cow<'_, Bitmap>, BitframeError> {
        if let Some(bitmap) = self.cache.as_ref().and_then(|cache| cache.get(index)) {
            return Ok(Cow::Borrowed(bitmap));
        }
        let frame = self
            .sequence
            .frame(index)
            .ok_or(BitframeError::FrameOutOfRange {
                frame_index: index,
                frame_count: self.sequence.len(),
            })?;
        Ok(Cow::Owned(decode_bitmap(
            frame.as_bytes(),
            self.sequence.width(),
            self.sequence.height(),
        )))
    }

    /// The bitmap at the current position.
    pub fn current(&self) -> Result<Cow<'_, Bitmap>, BitframeError> {
        self.frame(self.position)
    }

    /// Step to the next frame, looping to 0 after the last. Returns the new
    /// position.
    pub fn advance(&mut self) -> usize {
        let count = self.sequence.len();
        self.position = if count == 0 {
            0
        } else {
            (self.position + 1) % count
        };
        self.position
    }

    /// Jump to frame `index`.
    ///
    /// # Errors
    ///
    /// [`BitframeError::FrameOutOfRange`] past the last frame.
    pub fn seek(&mut self, index: usize) -> Result<(), BitframeError> {
        if index >= self.sequence.len() {
            return Err(BitframeError::FrameOutOfRange {
                frame_index: index,
                frame_count: self.sequence.len(),
            });
        }
        self.position = index;
        Ok(())
    }

    /// Current frame index.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Time each frame stays on screen.
    ///
    /// Sequences without a usable rate play at 30 fps.
    pub fn frame_interval(&self) -> Duration {
        self.sequence
            .meta()
            .frame_interval()
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_INGEST_FPS))
    }

    /// Whether frames come from a prebuilt cache.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// The sequence being played.
    pub fn sequence(&self) -> &FrameSequence {
        &self.sequence
    }
}
