//! Async rendering.
//!
//! [`render_async`] runs the whole render on a Tokio blocking thread and
//! returns a [`RenderFuture`] that resolves to the merged sequence. The
//! session's progress handle keeps updating while the future is pending.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bitframe::{BitframeError, RenderOptions, RenderSession, VideoSource, render_async};
//!
//! # async fn example() -> Result<(), BitframeError> {
//! let source = Arc::new(VideoSource::open("input.mp4")?);
//! let mut session = RenderSession::new();
//!
//! let sequence = render_async(source, RenderOptions::new(), &session).await?;
//! println!("{} frames, {:?}", sequence.len(), session.snapshot());
//! session.install(sequence);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::configuration::RenderOptions;
use crate::error::BitframeError;
use crate::media::MediaSource;
use crate::scheduler;
use crate::sequence::FrameSequence;
use crate::session::RenderSession;

/// A future that resolves to a rendered [`FrameSequence`].
///
/// The render itself runs on a blocking thread; polling this future only
/// waits for it. If the blocking task panics or is aborted the future
/// resolves to [`BitframeError::Cancelled`].
pub struct RenderFuture {
    handle: JoinHandle<Result<FrameSequence, BitframeError>>,
}

impl Future for RenderFuture {
    type Output = Result<FrameSequence, BitframeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(BitframeError::Cancelled)))
    }
}

/// Start a render on a Tokio blocking thread.
///
/// Progress is published through `session`'s handle. The resulting
/// sequence is returned rather than installed, since the session is only
/// borrowed; pass it to [`RenderSession::install`] to keep it there.
///
/// Must be called from within a Tokio runtime.
pub fn render_async(
    source: Arc<dyn MediaSource>,
    options: RenderOptions,
    session: &RenderSession,
) -> RenderFuture {
    let progress = session.progress();
    let handle =
        tokio::task::spawn_blocking(move || scheduler::execute(source.as_ref(), &options, &progress));
    RenderFuture { handle }
}
