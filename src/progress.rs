//! Progress reporting and cancellation support.
//!
//! Two views of the same render progress are offered:
//!
//! - [`ProgressState`], shared through a [`ProgressHandle`], can be polled
//!   from any thread for a [`RenderProgress`] snapshot (completion, elapsed
//!   time, ETA, throughput).
//! - [`ProgressCallback`] is pushed a [`ProgressInfo`] every
//!   [`batch_size`](crate::RenderOptions::with_batch_size) frames.
//!
//! [`CancellationToken`] requests cooperative cancellation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bitframe::{
//!     BitframeError, ProgressCallback, ProgressInfo, RenderOptions, RenderSession, VideoSource,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let source = VideoSource::open("input.mp4")?;
//! let options = RenderOptions::new().with_progress(Arc::new(PrintProgress));
//! let mut session = RenderSession::new();
//! session.render(&source, &options)?;
//! # Ok::<(), BitframeError>(())
//! ```

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

use serde::Serialize;

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Capturing and packing frames.
    Render,
}

/// A snapshot of progress, pushed to a [`ProgressCallback`].
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many frames have been processed so far.
    pub current: u64,
    /// Total frames expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 to 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Index of the frame that was just processed.
    pub current_frame: Option<u64>,
    /// Timeline position of that frame.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks may be
/// invoked from the render coordinator or from parallel cache builders.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread to request cancellation of the associated render.
/// Capture threads check [`is_cancelled`](CancellationToken::is_cancelled)
/// before each frame.
///
/// # Example
///
/// ```
/// use bitframe::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a render's progress.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    /// Frames packed so far.
    pub current: u64,
    /// Frames the render will produce.
    pub total: u64,
    /// Milliseconds since the render started.
    pub elapsed_ms: u64,
    /// Projected total duration in milliseconds; `0` until the first frame.
    pub estimated_total_ms: u64,
    /// Frames packed per wall-clock second.
    pub render_fps: f64,
    /// Set once the merged sequence has been published.
    pub finished: bool,
}

impl RenderProgress {
    /// Completion in percent, `0.0` when `total` is zero.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64 * 100.0
        }
    }

    /// Projected time remaining, `None` until the first frame.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        (self.current > 0).then(|| {
            Duration::from_millis(self.estimated_total_ms.saturating_sub(self.elapsed_ms))
        })
    }
}

/// Projected total duration: `elapsed / current * total`, or `0` before
/// any frame is done.
pub fn estimate_total(elapsed_ms: u64, current: u64, total: u64) -> u64 {
    if current == 0 {
        return 0;
    }
    (elapsed_ms as u128 * total as u128 / current as u128) as u64
}

#[derive(Debug, Default)]
struct Timing {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

/// Live progress of one render, shared between the coordinator and any
/// number of observers.
///
/// `current` only grows during a render, `total` is fixed when the render
/// begins, and `finished` flips to `true` exactly once.
#[derive(Debug, Default)]
pub struct ProgressState {
    current: AtomicU64,
    total: AtomicU64,
    finished: AtomicBool,
    timing: Mutex<Timing>,
}

/// Cloneable handle to a [`ProgressState`].
pub type ProgressHandle = Arc<ProgressState>;

impl ProgressState {
    /// An idle state with no render started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new render of `total` frames and start the clock.
    pub(crate) fn begin(&self, total: u64) {
        let mut timing = self.timing.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        *timing = Timing {
            started: Some(Instant::now()),
            stopped: None,
        };
    }

    /// Count one packed frame. Returns the new count.
    pub(crate) fn record_frame(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the render finished and stop the clock.
    ///
    /// Returns `false` if it was already finished.
    pub(crate) fn finish(&self) -> bool {
        let first = self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.stop_clock();
        }
        first
    }

    /// Stop the clock without finishing; counters keep their last values.
    pub(crate) fn halt(&self) {
        self.stop_clock();
    }

    fn stop_clock(&self) {
        let mut timing = self.timing.lock().unwrap_or_else(PoisonError::into_inner);
        timing.stopped.get_or_insert_with(Instant::now);
    }

    /// Whether the last render finished.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Take a consistent snapshot.
    pub fn snapshot(&self) -> RenderProgress {
        let elapsed = {
            let timing = self.timing.lock().unwrap_or_else(PoisonError::into_inner);
            match (timing.started, timing.stopped) {
                (Some(started), Some(stopped)) => stopped.duration_since(started),
                (Some(started), None) => started.elapsed(),
                (None, _) => Duration::ZERO,
            }
        };
        let current = self.current.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        let elapsed_ms = elapsed.as_millis() as u64;
        let seconds = elapsed.as_secs_f64();

        RenderProgress {
            current,
            total,
            elapsed_ms,
            estimated_total_ms: estimate_total(elapsed_ms, current, total),
            render_fps: if seconds > 0.0 {
                current as f64 / seconds
            } else {
                0.0
            },
            finished: self.is_finished(),
        }
    }
}

/// Pushes [`ProgressInfo`] to the configured callback every `batch_size`
/// frames, reading counters and timing from the shared [`ProgressState`].
pub(crate) struct RenderReporter {
    callback: Arc<dyn ProgressCallback>,
    state: ProgressHandle,
    fps: f64,
    batch_size: u64,
    pending: u64,
}

impl RenderReporter {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        state: ProgressHandle,
        fps: f64,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            state,
            fps,
            batch_size: batch_size.max(1),
            pending: 0,
        }
    }

    /// Count frame `frame_index` as packed.
    pub(crate) fn record(&mut self, frame_index: u64) {
        self.state.record_frame();
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.pending = 0;
            self.report(Some(frame_index));
        }
    }

    /// Emit the closing report regardless of the batch position.
    pub(crate) fn finish(&mut self) {
        self.pending = 0;
        self.report(None);
    }

    fn report(&self, frame_index: Option<u64>) {
        let snapshot = self.state.snapshot();
        let total = (snapshot.total > 0).then_some(snapshot.total);
        let info = ProgressInfo {
            operation: OperationType::Render,
            current: snapshot.current,
            total,
            percentage: total.map(|_| snapshot.percentage() as f32),
            elapsed: Duration::from_millis(snapshot.elapsed_ms),
            estimated_remaining: snapshot.estimated_remaining(),
            current_frame: frame_index,
            current_timestamp: frame_index
                .filter(|_| self.fps > 0.0)
                .and_then(|index| Duration::try_from_secs_f64(index as f64 / self.fps).ok()),
        };
        self.callback.on_progress(&info);
    }
}
