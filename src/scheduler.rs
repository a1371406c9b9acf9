//! Segment scheduling.
//!
//! A render of `total` frames is split into contiguous [`Segment`]s. Each
//! non-empty segment gets one capture thread with its own
//! [`FrameCaptureUnit`] and one [`PackingWorker`]; the coordinating thread
//! collects packed frames from every worker into per-segment
//! [`SegmentFrames`] maps and [`merge`]s them by frame index once every
//! segment is complete.
//!
//! Within a segment, capture of frame `k + 1` overlaps packing of frame `k`
//! because the capture thread only blocks when the worker's queue is full.
//! Across segments, replies interleave arbitrarily; order is restored only
//! at merge time.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvError, Sender};
use log::{debug, info, warn};

use crate::capture::FrameCaptureUnit;
use crate::codec::PackedFrame;
use crate::configuration::RenderOptions;
use crate::error::BitframeError;
use crate::media::{CaptureTarget, MediaSource};
use crate::metadata::RenderMeta;
use crate::progress::{ProgressHandle, RenderReporter};
use crate::sequence::{FrameSequence, PackSettings};
use crate::worker::{PackFrameRequest, PackingWorker, WorkerMessage, WorkerReply, WorkerRequest};

/// Default number of segments, and therefore of concurrent pipelines.
pub const DEFAULT_SEGMENT_COUNT: usize = 4;

/// A half-open range of frame indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Position of the segment in the partition.
    pub index: usize,
    /// First frame index.
    pub start: u64,
    /// One past the last frame index.
    pub end: u64,
}

impl Segment {
    /// Number of frames covered.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns `true` for a segment with no frames.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `frame_index` falls inside the segment.
    pub fn contains(&self, frame_index: u64) -> bool {
        (self.start..self.end).contains(&frame_index)
    }

    /// The frame indices covered.
    pub fn frames(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Largest number of frames a single render may produce.
pub const MAX_RENDER_FRAMES: u64 = u32::MAX as u64;

/// Frames sampled from `duration` at `fps`, never fewer than one.
///
/// Saturates at `u64::MAX`; [`RenderSession::render`](crate::RenderSession::render)
/// rejects anything above [`MAX_RENDER_FRAMES`].
pub fn total_frames(duration: Duration, fps: f64) -> u64 {
    ((duration.as_secs_f64() * fps).floor() as u64).max(1)
}

/// Split `[0, total)` into `count` contiguous segments.
///
/// Every segment but the trailing ones holds `ceil(total / count)` frames;
/// trailing segments may be short or empty. The segments are disjoint and
/// their union is exactly `[0, total)`.
///
/// ```
/// use bitframe::scheduler::partition;
///
/// let bounds: Vec<_> = partition(10, 4).iter().map(|s| (s.start, s.end)).collect();
/// assert_eq!(bounds, vec![(0, 3), (3, 6), (6, 9), (9, 10)]);
/// ```
pub fn partition(total: u64, count: usize) -> Vec<Segment> {
    let count = count.max(1);
    let per = total.div_ceil(count as u64);
    (0..count)
        .map(|index| {
            let i = index as u64;
            Segment {
                index,
                start: i.saturating_mul(per).min(total),
                end: (i + 1).saturating_mul(per).min(total),
            }
        })
        .collect()
}

/// Packed frames received for one segment, keyed by absolute frame index.
#[derive(Debug, Clone)]
pub struct SegmentFrames {
    segment: Segment,
    frames: BTreeMap<u64, PackedFrame>,
}

impl SegmentFrames {
    /// An empty map for `segment`.
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            frames: BTreeMap::new(),
        }
    }

    /// Store a frame.
    ///
    /// Returns `false` without storing when the index lies outside the
    /// segment or was already received; the first arrival wins.
    pub fn insert(&mut self, frame_index: u64, frame: PackedFrame) -> bool {
        if !self.segment.contains(frame_index) {
            warn!(
                "Segment {}: ignoring frame {frame_index} outside [{}, {})",
                self.segment.index, self.segment.start, self.segment.end
            );
            return false;
        }
        if self.frames.contains_key(&frame_index) {
            warn!(
                "Segment {}: ignoring duplicate frame {frame_index}",
                self.segment.index
            );
            return false;
        }
        self.frames.insert(frame_index, frame);
        true
    }

    /// The segment this map collects.
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Whether `frame_index` has been received.
    pub fn contains(&self, frame_index: u64) -> bool {
        self.frames.contains_key(&frame_index)
    }

    /// Number of frames received.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frame has been received.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether every index of the segment has been received.
    pub fn is_complete(&self) -> bool {
        self.frames.len() as u64 == self.segment.len()
    }

    /// Remove and return the frame at `frame_index`.
    pub fn take(&mut self, frame_index: u64) -> Option<PackedFrame> {
        self.frames.remove(&frame_index)
    }
}

/// Merge per-segment maps into one sequence ordered by frame index.
///
/// For every index in `[0, total)` the frame is taken from the first map
/// that holds it, so the result does not depend on the order of `maps`.
///
/// # Errors
///
/// [`BitframeError::IncompleteRender`] for the first index no map holds.
pub fn merge(maps: Vec<SegmentFrames>, total: u64) -> Result<Vec<PackedFrame>, BitframeError> {
    let mut maps = maps;
    let held: usize = maps.iter().map(SegmentFrames::len).sum();
    let mut merged = Vec::with_capacity(held.min(total as usize));
    for frame_index in 0..total {
        let frame = maps
            .iter_mut()
            .find_map(|map| map.take(frame_index))
            .ok_or(BitframeError::IncompleteRender {
                frame_index,
                total_frames: total,
            })?;
        merged.push(frame);
    }
    Ok(merged)
}

/// Outcome of one capture thread.
enum CaptureEvent {
    Finished { segment: usize, issued: u64 },
    Failed { error: BitframeError },
}

struct SegmentState {
    frames: SegmentFrames,
    /// Number of captures issued, known once the capture thread is done.
    issued: Option<u64>,
    complete: bool,
}

impl SegmentState {
    fn check_complete(&mut self) -> bool {
        if !self.complete
            && self
                .issued
                .is_some_and(|issued| self.frames.len() as u64 >= issued)
        {
            self.complete = true;
            debug!(
                "Segment {} complete ({} frames)",
                self.frames.segment.index,
                self.frames.len()
            );
            return true;
        }
        false
    }
}

/// Run a full render of `source` and return the merged sequence.
///
/// Progress is published through `progress`; on failure it keeps its last
/// values and `finished` stays `false`.
pub(crate) fn execute(
    source: &dyn MediaSource,
    options: &RenderOptions,
    progress: &ProgressHandle,
) -> Result<FrameSequence, BitframeError> {
    let fps = options.target_fps;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(BitframeError::InvalidFrameRate(fps));
    }
    let (native_width, native_height) = source.native_size();
    let target = options.frame_output.resolve(native_width, native_height);
    if target.width == 0 || target.height == 0 {
        return Err(BitframeError::InvalidDimensions {
            width: target.width,
            height: target.height,
        });
    }

    let duration = source.duration();
    let total = total_frames(duration, fps);
    if total > MAX_RENDER_FRAMES {
        return Err(BitframeError::InvalidFrameRate(fps));
    }
    let segments: Vec<Segment> = partition(total, options.segments)
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect();
    let mut meta = RenderMeta::new(
        target.width,
        target.height,
        duration.as_secs_f64(),
        total,
        fps,
    );

    info!(
        "Rendering {total} frames of {} at {fps} fps ({}x{}) across {} segments",
        source.describe(),
        target.width,
        target.height,
        segments.len()
    );
    progress.begin(total);

    match render_segments(source, options, target, &segments, total, progress) {
        Ok(frames) => {
            meta.finalize(frames.len() as u64);
            let sequence = FrameSequence::from_parts(meta, frames, None).with_packing(PackSettings {
                threshold: options.threshold,
                invert: options.invert,
            });
            progress.finish();
            info!(
                "Render finished: {} frames, {:.3} fps",
                sequence.len(),
                sequence.meta().fps
            );
            Ok(sequence)
        }
        Err(error) => {
            progress.halt();
            warn!("Render failed: {error}");
            Err(error)
        }
    }
}

fn render_segments(
    source: &dyn MediaSource,
    options: &RenderOptions,
    target: CaptureTarget,
    segments: &[Segment],
    total: u64,
    progress: &ProgressHandle,
) -> Result<Vec<PackedFrame>, BitframeError> {
    let (reply_sender, replies) = channel::unbounded();
    // Worker ids are positions in `segments`.
    let workers = segments
        .iter()
        .enumerate()
        .map(|(id, _)| PackingWorker::spawn(id, options.arena_capacity, reply_sender.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    drop(reply_sender);

    wait_until_ready(&workers, &replies)?;

    let mut tracker = RenderReporter::new(
        options.progress.clone(),
        progress.clone(),
        options.target_fps,
        options.batch_size,
    );

    let mut states: Vec<SegmentState> = segments
        .iter()
        .map(|segment| SegmentState {
            frames: SegmentFrames::new(*segment),
            issued: None,
            complete: false,
        })
        .collect();

    let abort = AtomicBool::new(false);
    let (event_sender, events) = channel::unbounded();

    thread::scope(|scope| {
        for (position, segment) in segments.iter().enumerate() {
            let requests = workers[position].sender();
            let events = event_sender.clone();
            let abort = &abort;
            let segment = *segment;
            let spawned = thread::Builder::new()
                .name(format!("bitframe-capture-{}", segment.index))
                .spawn_scoped(scope, move || {
                    let event = match capture_segment(source, options, target, segment, requests, abort)
                    {
                        Ok(issued) => CaptureEvent::Finished {
                            segment: position,
                            issued,
                        },
                        Err(error) => CaptureEvent::Failed { error },
                    };
                    let _ = events.send(event);
                });
            if let Err(error) = spawned {
                abort.store(true, Ordering::Release);
                return Err(BitframeError::CaptureUnavailable {
                    segment: segment.index,
                    reason: format!("cannot spawn capture thread: {error}"),
                });
            }
        }
        drop(event_sender);

        let outcome = collect(&mut states, &replies, events, &mut tracker);
        if outcome.is_err() {
            abort.store(true, Ordering::Release);
        }
        outcome
    })?;

    let maps = states.into_iter().map(|state| state.frames).collect();
    let frames = merge(maps, total)?;
    tracker.finish();
    Ok(frames)
}

fn wait_until_ready(
    workers: &[PackingWorker],
    replies: &Receiver<WorkerMessage>,
) -> Result<(), BitframeError> {
    for worker in workers {
        worker
            .init()
            .map_err(|error| BitframeError::ResourceUnavailable(error.to_string()))?;
    }

    let mut ready = 0;
    while ready < workers.len() {
        let message = replies.recv().map_err(|_| {
            BitframeError::ResourceUnavailable("packing workers exited before init".to_owned())
        })?;
        match message.reply {
            WorkerReply::Ready => ready += 1,
            WorkerReply::Error { message: reason, .. } => {
                return Err(BitframeError::ResourceUnavailable(format!(
                    "worker {}: {reason}",
                    message.worker
                )));
            }
            WorkerReply::FramePacked { frame_index, .. } => {
                warn!(
                    "Worker {} sent frame {frame_index} before init completed",
                    message.worker
                );
            }
        }
    }
    debug!("{ready} packing workers ready");
    Ok(())
}

fn capture_segment(
    source: &dyn MediaSource,
    options: &RenderOptions,
    target: CaptureTarget,
    segment: Segment,
    requests: Option<Sender<WorkerRequest>>,
    abort: &AtomicBool,
) -> Result<u64, BitframeError> {
    let requests = requests.ok_or(BitframeError::WorkerDisconnected {
        worker: segment.index,
    })?;
    let mut unit = FrameCaptureUnit::open(source, segment.index, target)?;
    let mut issued = 0;

    for frame_index in segment.frames() {
        if abort.load(Ordering::Acquire) {
            break;
        }
        if options.is_cancelled() {
            return Err(BitframeError::Cancelled);
        }

        let timestamp = Duration::from_secs_f64(frame_index as f64 / options.target_fps);
        let pixels = unit.capture(timestamp)?;
        let request =
            PackFrameRequest::from_pixels(pixels, options.threshold, options.invert, frame_index);
        requests
            .send(WorkerRequest::PackFrame(request))
            .map_err(|_| BitframeError::WorkerDisconnected {
                worker: segment.index,
            })?;
        issued += 1;
    }

    debug!("Segment {}: issued {issued} captures", segment.index);
    Ok(issued)
}

/// Something the coordinator is woken by.
enum Wakeup {
    Reply(Result<WorkerMessage, RecvError>),
    Capture(Result<CaptureEvent, RecvError>),
}

/// Drain worker replies and capture events until every segment is complete.
fn collect(
    states: &mut [SegmentState],
    replies: &Receiver<WorkerMessage>,
    events: Receiver<CaptureEvent>,
    tracker: &mut RenderReporter,
) -> Result<(), BitframeError> {
    let mut events = events;
    let mut remaining = states.len();

    while remaining > 0 {
        let wakeup = crossbeam::select! {
            recv(replies) -> message => Wakeup::Reply(message),
            recv(events) -> event => Wakeup::Capture(event),
        };

        match wakeup {
            Wakeup::Reply(Err(_)) => {
                let worker = states.iter().position(|state| !state.complete).unwrap_or(0);
                return Err(BitframeError::WorkerDisconnected { worker });
            }
            Wakeup::Reply(Ok(WorkerMessage { worker, reply })) => match reply {
                WorkerReply::FramePacked {
                    frame_index,
                    packed,
                } => match states.get_mut(worker) {
                    Some(state) => {
                        if state.frames.insert(frame_index, packed) {
                            tracker.record(frame_index);
                        }
                        if state.check_complete() {
                            remaining -= 1;
                        }
                    }
                    None => warn!("Reply from unknown worker {worker}"),
                },
                WorkerReply::Error {
                    frame_index,
                    message,
                } => {
                    return Err(BitframeError::WorkerFailed {
                        worker,
                        frame_index,
                        message,
                    });
                }
                WorkerReply::Ready => debug!("Worker {worker} re-sent Ready"),
            },
            Wakeup::Capture(Ok(CaptureEvent::Finished { segment, issued })) => {
                if let Some(state) = states.get_mut(segment) {
                    state.issued = Some(issued);
                    if state.check_complete() {
                        remaining -= 1;
                    }
                }
            }
            Wakeup::Capture(Ok(CaptureEvent::Failed { error })) => return Err(error),
            // Every capture thread has reported; only replies remain.
            Wakeup::Capture(Err(_)) => events = channel::never(),
        }
    }

    Ok(())
}
