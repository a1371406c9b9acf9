//! Progress and cancellation integration tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bitframe::progress::estimate_total;
use bitframe::{
    CancellationToken, MemorySource, OperationType, PixelBuffer, PixelFormat, ProgressCallback,
    ProgressInfo, ProgressState, RenderOptions, RenderProgress, RenderSession,
};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancel_from_progress_callback_stops_the_render() {
    struct CancelAfter {
        token: CancellationToken,
        after: u64,
    }

    impl ProgressCallback for CancelAfter {
        fn on_progress(&self, info: &ProgressInfo) {
            if info.current >= self.after {
                self.token.cancel();
            }
        }
    }

    let frames: Vec<PixelBuffer> = (0..2000)
        .map(|_| PixelBuffer::filled(8, 8, PixelFormat::Gray8, &[255]).unwrap())
        .collect();
    let source = MemorySource::new(frames, 50.0).unwrap();
    let token = CancellationToken::new();
    let options = RenderOptions::new()
        .with_target_fps(50.0)
        .with_segments(1)
        .with_cancellation(token.clone())
        .with_progress(Arc::new(CancelAfter {
            token: token.clone(),
            after: 3,
        }));

    let mut session = RenderSession::new();
    let error = session.render(&source, &options).unwrap_err();
    assert!(matches!(error, bitframe::BitframeError::Cancelled));

    let snapshot = session.snapshot();
    assert!(!snapshot.finished);
    assert!(snapshot.current < snapshot.total);
}

// ── Estimates ──────────────────────────────────────────────────────

#[test]
fn estimate_is_zero_before_first_frame() {
    assert_eq!(estimate_total(1234, 0, 100), 0);
}

#[test]
fn estimate_scales_elapsed_time() {
    assert_eq!(estimate_total(1000, 10, 100), 10_000);
    assert_eq!(estimate_total(300, 3, 4), 400);
    assert_eq!(estimate_total(500, 5, 5), 500);
}

#[test]
fn render_progress_helpers() {
    let progress = RenderProgress {
        current: 25,
        total: 100,
        elapsed_ms: 1000,
        estimated_total_ms: 4000,
        render_fps: 25.0,
        finished: false,
    };
    assert_eq!(progress.percentage(), 25.0);
    assert_eq!(progress.estimated_remaining(), Some(Duration::from_millis(3000)));

    let idle = RenderProgress::default();
    assert_eq!(idle.percentage(), 0.0);
    assert_eq!(idle.estimated_remaining(), None);
}

#[test]
fn render_progress_serializes_camel_case() {
    let value = serde_json::to_value(RenderProgress::default()).unwrap();
    assert!(value.get("elapsedMs").is_some());
    assert!(value.get("estimatedTotalMs").is_some());
    assert!(value.get("renderFps").is_some());
}

// ── ProgressState ──────────────────────────────────────────────────

#[test]
fn idle_state_snapshot() {
    let state = ProgressState::new();
    let snapshot = state.snapshot();
    assert_eq!(snapshot, RenderProgress::default());
    assert!(!state.is_finished());
}

#[test]
fn state_is_observable_from_another_thread() {
    let frames: Vec<PixelBuffer> = (0..40)
        .map(|_| PixelBuffer::filled(8, 8, PixelFormat::Gray8, &[0]).unwrap())
        .collect();
    let source = MemorySource::new(frames, 40.0).unwrap();
    let mut session = RenderSession::new();
    let progress = session.progress();

    let watcher = thread::spawn(move || {
        let mut last = 0;
        for _ in 0..1000 {
            let snapshot = progress.snapshot();
            assert!(snapshot.current >= last, "progress went backwards");
            last = snapshot.current;
            if snapshot.finished {
                return snapshot;
            }
            thread::sleep(Duration::from_millis(1));
        }
        progress.snapshot()
    });

    session
        .render(&source, &RenderOptions::new().with_target_fps(40.0))
        .unwrap();
    let seen = watcher.join().unwrap();
    let snapshot = session.snapshot();

    assert!(snapshot.finished);
    assert_eq!((snapshot.current, snapshot.total), (40, 40));
    assert!(seen.current <= 40);
}

#[test]
fn operation_type_debug() {
    assert_eq!(format!("{:?}", OperationType::Render), "Render");
}
