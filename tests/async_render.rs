//! Async render tests.

#![cfg(feature = "async")]

use std::sync::Arc;

use bitframe::{
    BitframeError, CancellationToken, MemorySource, PixelBuffer, PixelFormat, RenderOptions,
    RenderSession, render_async,
};

fn source() -> Arc<MemorySource> {
    let black = PixelBuffer::filled(16, 2, PixelFormat::Gray8, &[0]).unwrap();
    let white = PixelBuffer::filled(16, 2, PixelFormat::Gray8, &[255]).unwrap();
    Arc::new(MemorySource::new(vec![black, white], 2.0).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn render_async_resolves_to_the_sequence() {
    let mut session = RenderSession::new();
    let sequence = render_async(source(), RenderOptions::new().with_target_fps(2.0), &session)
        .await
        .unwrap();

    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.frames()[1].as_bytes(), &[0xFF; 4]);
    assert!(session.snapshot().finished);

    session.install(sequence);
    assert_eq!(session.meta().unwrap().frame_count, 2);
}

#[tokio::test]
async fn render_async_propagates_errors() {
    let token = CancellationToken::new();
    token.cancel();
    let options = RenderOptions::new()
        .with_target_fps(2.0)
        .with_cancellation(token);

    let session = RenderSession::new();
    let result = render_async(source(), options, &session).await;
    assert!(matches!(result, Err(BitframeError::Cancelled)));
    assert!(session.sequence().is_none());
}
