//! Packing workers.
//!
//! A [`PackingWorker`] is a dedicated thread that binarizes and bit-packs
//! pixel buffers sent to it over a bounded channel. Replies from every
//! worker of a render funnel into one shared channel, tagged with the
//! worker id, where the scheduler collects them.
//!
//! The protocol mirrors a request/reply message port:
//!
//! - [`WorkerRequest::Init`] readies the worker's [`PackArena`] and is
//!   answered with [`WorkerReply::Ready`].
//! - [`WorkerRequest::PackFrame`] is answered with
//!   [`WorkerReply::FramePacked`].
//! - Any failure is answered with [`WorkerReply::Error`]; the worker keeps
//!   serving requests afterwards.
//!
//! Pixel data moves into the request and packed frames move out in the
//! reply, so nothing is copied at the channel boundary.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use log::{debug, warn};

use crate::codec::{PackedFrame, PixelBuffer, bytes_per_frame, pack_into};
use crate::configuration::PixelFormat;
use crate::error::BitframeError;

/// Default arena size per worker, 10 MB.
pub const DEFAULT_ARENA_CAPACITY: usize = 10_000_000;

/// Requests a worker may have queued before senders block.
const PIPELINE_DEPTH: usize = 4;

/// Bounded bump allocator holding a worker's pack output.
///
/// Reset before every pack, so only one frame lives in it at a time.
#[derive(Debug)]
pub struct PackArena {
    buffer: Vec<u8>,
    capacity: usize,
    offset: usize,
    ready: bool,
}

impl PackArena {
    /// An arena of `capacity` bytes. Nothing is allocated until
    /// [`init`](PackArena::init).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            capacity,
            offset: 0,
            ready: false,
        }
    }

    /// Reserve the arena's memory.
    ///
    /// # Errors
    ///
    /// [`BitframeError::ResourceUnavailable`] if the capacity is zero or
    /// cannot be reserved.
    pub fn init(&mut self) -> Result<(), BitframeError> {
        if self.ready {
            return Ok(());
        }
        if self.capacity == 0 {
            return Err(BitframeError::ResourceUnavailable(
                "codec arena capacity is zero".to_owned(),
            ));
        }
        self.buffer
            .try_reserve_exact(self.capacity)
            .map_err(|error| {
                BitframeError::ResourceUnavailable(format!(
                    "cannot reserve {} byte codec arena: {error}",
                    self.capacity
                ))
            })?;
        self.ready = true;
        Ok(())
    }

    /// Whether [`init`](PackArena::init) succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Release every allocation.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Allocate `len` zeroed bytes.
    ///
    /// # Errors
    ///
    /// - [`BitframeError::ResourceUnavailable`] before `init`.
    /// - [`BitframeError::ArenaExhausted`] if `len` does not fit.
    pub fn alloc(&mut self, len: usize) -> Result<&mut [u8], BitframeError> {
        if !self.ready {
            return Err(BitframeError::ResourceUnavailable(
                "codec arena used before init".to_owned(),
            ));
        }
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.capacity)
            .ok_or(BitframeError::ArenaExhausted {
                requested: len,
                capacity: self.capacity,
            })?;
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        let start = std::mem::replace(&mut self.offset, end);
        let slice = &mut self.buffer[start..end];
        slice.fill(0);
        Ok(slice)
    }
}

/// Pack `pixels` through `arena` and copy the result out.
pub fn pack_with_arena(
    arena: &mut PackArena,
    pixels: &PixelBuffer,
    threshold: u8,
    invert: bool,
) -> Result<PackedFrame, BitframeError> {
    arena.reset();
    let output = arena.alloc(bytes_per_frame(pixels.width(), pixels.height()))?;
    pack_into(pixels, threshold, invert, output);
    Ok(PackedFrame::from_vec_unchecked(output.to_vec()))
}

/// One frame to pack.
#[derive(Debug, Clone)]
pub struct PackFrameRequest {
    /// Raw pixel bytes.
    pub frame_data: Vec<u8>,
    /// Layout of `frame_data`.
    pub pixel_format: PixelFormat,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Luminance threshold.
    pub threshold: u8,
    /// Swap on and off.
    pub invert: bool,
    /// Absolute frame index within the render.
    pub frame_index: u64,
}

impl PackFrameRequest {
    /// Build a request that takes ownership of `pixels`.
    pub fn from_pixels(pixels: PixelBuffer, threshold: u8, invert: bool, frame_index: u64) -> Self {
        let (width, height, pixel_format) = (pixels.width(), pixels.height(), pixels.format());
        Self {
            frame_data: pixels.into_raw(),
            pixel_format,
            width,
            height,
            threshold,
            invert,
            frame_index,
        }
    }
}

/// A message sent to a worker.
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    /// Ready the codec arena.
    Init,
    /// Pack one frame.
    PackFrame(PackFrameRequest),
}

/// A message sent back by a worker.
#[derive(Debug, Clone)]
pub enum WorkerReply {
    /// The arena is ready.
    Ready,
    /// A frame was packed.
    FramePacked {
        /// Index from the request.
        frame_index: u64,
        /// Packed bytes.
        packed: PackedFrame,
    },
    /// A request failed.
    Error {
        /// Index from the request, if the failure was tied to a frame.
        frame_index: Option<u64>,
        /// What went wrong.
        message: String,
    },
}

/// A reply tagged with the worker that sent it.
#[derive(Debug, Clone)]
pub struct WorkerMessage {
    /// Worker id.
    pub worker: usize,
    /// The reply.
    pub reply: WorkerReply,
}

/// Handle to a packing thread.
///
/// Dropping the handle closes the request channel and joins the thread.
///
/// # Example
///
/// ```
/// use crossbeam::channel;
///
/// use bitframe::{PixelBuffer, PixelFormat};
/// use bitframe::worker::{PackFrameRequest, PackingWorker, WorkerReply, WorkerRequest};
///
/// let (replies, inbox) = channel::unbounded();
/// let worker = PackingWorker::spawn(0, 1024, replies)?;
/// worker.init()?;
/// assert!(matches!(inbox.recv().unwrap().reply, WorkerReply::Ready));
///
/// let pixels = PixelBuffer::filled(8, 1, PixelFormat::Gray8, &[255])?;
/// worker.send(WorkerRequest::PackFrame(PackFrameRequest::from_pixels(pixels, 128, false, 7)))?;
/// match inbox.recv().unwrap().reply {
///     WorkerReply::FramePacked { frame_index, packed } => {
///         assert_eq!(frame_index, 7);
///         assert_eq!(packed.as_bytes(), &[0xFF]);
///     }
///     other => panic!("unexpected reply {other:?}"),
/// }
/// # Ok::<(), bitframe::BitframeError>(())
/// ```
pub struct PackingWorker {
    id: usize,
    requests: Option<Sender<WorkerRequest>>,
    thread: Option<JoinHandle<()>>,
}

impl PackingWorker {
    /// Start a worker thread that answers on `replies`.
    ///
    /// # Errors
    ///
    /// [`BitframeError::ResourceUnavailable`] if the thread cannot be spawned.
    pub fn spawn(
        id: usize,
        arena_capacity: usize,
        replies: Sender<WorkerMessage>,
    ) -> Result<Self, BitframeError> {
        let (requests, inbox) = channel::bounded(PIPELINE_DEPTH);
        let thread = thread::Builder::new()
            .name(format!("bitframe-pack-{id}"))
            .spawn(move || {
                let mut arena = PackArena::new(arena_capacity);
                for request in inbox {
                    let reply = handle_request(&mut arena, request);
                    if replies.send(WorkerMessage { worker: id, reply }).is_err() {
                        debug!("Worker {id}: reply channel closed, stopping");
                        break;
                    }
                }
            })
            .map_err(|error| {
                BitframeError::ResourceUnavailable(format!("cannot spawn packing worker {id}: {error}"))
            })?;

        debug!("Spawned packing worker {id}");
        Ok(Self {
            id,
            requests: Some(requests),
            thread: Some(thread),
        })
    }

    /// Worker id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Queue a request, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// [`BitframeError::WorkerDisconnected`] if the thread has exited.
    pub fn send(&self, request: WorkerRequest) -> Result<(), BitframeError> {
        self.requests
            .as_ref()
            .ok_or(BitframeError::WorkerDisconnected { worker: self.id })?
            .send(request)
            .map_err(|_| BitframeError::WorkerDisconnected { worker: self.id })
    }

    /// Queue [`WorkerRequest::Init`].
    pub fn init(&self) -> Result<(), BitframeError> {
        self.send(WorkerRequest::Init)
    }

    /// A cloneable sender for this worker's queue.
    pub(crate) fn sender(&self) -> Option<Sender<WorkerRequest>> {
        self.requests.clone()
    }
}

impl Drop for PackingWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Packing worker {} panicked", self.id);
        }
        debug!("Packing worker {} stopped", self.id);
    }
}

fn handle_request(arena: &mut PackArena, request: WorkerRequest) -> WorkerReply {
    match request {
        WorkerRequest::Init => match arena.init() {
            Ok(()) => WorkerReply::Ready,
            Err(error) => WorkerReply::Error {
                frame_index: None,
                message: error.to_string(),
            },
        },
        WorkerRequest::PackFrame(request) => {
            let frame_index = request.frame_index;
            // Lazily initialise if the host skipped Init.
            let packed = arena.init().and_then(|()| {
                let pixels = PixelBuffer::new(
                    request.width,
                    request.height,
                    request.pixel_format,
                    request.frame_data,
                )?;
                pack_with_arena(arena, &pixels, request.threshold, request.invert)
            });
            match packed {
                Ok(packed) => WorkerReply::FramePacked {
                    frame_index,
                    packed,
                },
                Err(error) => WorkerReply::Error {
                    frame_index: Some(frame_index),
                    message: error.to_string(),
                },
            }
        }
    }
}
