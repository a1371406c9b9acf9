//! Render sessions.
//!
//! A [`RenderSession`] is the caller-held owner of a render: it exposes the
//! live progress state while frames are being packed and holds the merged
//! [`FrameSequence`] once the render succeeds.

use log::debug;

use crate::configuration::RenderOptions;
use crate::error::BitframeError;
use crate::media::MediaSource;
use crate::metadata::RenderMeta;
use crate::progress::{ProgressHandle, RenderProgress};
use crate::scheduler;
use crate::sequence::FrameSequence;

/// Owner of one render's progress and output.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::thread;
/// use std::time::Duration;
///
/// use bitframe::{BitframeError, RenderOptions, RenderSession, VideoSource};
///
/// let source = VideoSource::open("input.mp4")?;
/// let mut session = RenderSession::new();
///
/// // `finished` stays false when a render fails, so also stop once it returns.
/// let done = Arc::new(AtomicBool::new(false));
/// let progress = session.progress();
/// let watcher = thread::spawn({
///     let done = done.clone();
///     move || {
///         while !progress.is_finished() && !done.load(Ordering::Acquire) {
///             let snapshot = progress.snapshot();
///             println!("{}/{} frames", snapshot.current, snapshot.total);
///             thread::sleep(Duration::from_millis(250));
///         }
///     }
/// });
///
/// let result = session.render(&source, &RenderOptions::new().with_resolution(Some(128), None));
/// done.store(true, Ordering::Release);
/// watcher.join().unwrap();
/// result?;
///
/// let sequence = session.take_sequence().unwrap();
/// println!("{} frames of {} bytes", sequence.len(), sequence.meta().bytes_per_frame);
/// # Ok::<(), BitframeError>(())
/// ```
#[derive(Debug, Default)]
pub struct RenderSession {
    progress: ProgressHandle,
    sequence: Option<FrameSequence>,
}

impl RenderSession {
    /// A session with no render started.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable handle to the live progress state.
    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle::clone(&self.progress)
    }

    /// Current progress.
    pub fn snapshot(&self) -> RenderProgress {
        self.progress.snapshot()
    }

    /// Render `source` and publish the result into this session.
    ///
    /// Any previously held sequence is discarded when the render starts.
    /// On error nothing is published.
    pub fn render(
        &mut self,
        source: &dyn MediaSource,
        options: &RenderOptions,
    ) -> Result<(), BitframeError> {
        self.sequence = None;
        let sequence = scheduler::execute(source, options, &self.progress)?;
        debug!("Session published {} frames", sequence.len());
        self.sequence = Some(sequence);
        Ok(())
    }

    /// The last successful render's frames.
    pub fn sequence(&self) -> Option<&FrameSequence> {
        self.sequence.as_ref()
    }

    /// The last successful render's metadata.
    pub fn meta(&self) -> Option<&RenderMeta> {
        self.sequence.as_ref().map(FrameSequence::meta)
    }

    /// Move the frames out of the session.
    pub fn take_sequence(&mut self) -> Option<FrameSequence> {
        self.sequence.take()
    }

    /// Publish a sequence produced elsewhere, e.g. by an async render.
    pub fn install(&mut self, sequence: FrameSequence) {
        self.sequence = Some(sequence);
    }
}

/// Render `source` into `session`.
///
/// Equivalent to [`RenderSession::render`].
pub fn render(
    source: &dyn MediaSource,
    options: &RenderOptions,
    session: &mut RenderSession,
) -> Result<(), BitframeError> {
    session.render(source, options)
}
