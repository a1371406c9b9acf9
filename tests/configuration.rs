//! RenderOptions, FrameOutputOptions, PixelFormat, and CacheOptions tests.

use bitframe::{CacheOptions, FrameOutputOptions, PixelFormat, RenderOptions};

// ── RenderOptions builder ──────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = RenderOptions::new();
    assert_eq!(options.target_fps(), 30.0);
    assert_eq!(options.threshold(), 128);
    assert!(!options.invert());
    assert_eq!(options.segments(), 4);

    let debug = format!("{options:?}");
    assert!(debug.contains("RenderOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 1"));
    assert!(debug.contains("arena_capacity: 10000000"));
}

#[test]
fn options_builders() {
    let options = RenderOptions::new()
        .with_target_fps(12.5)
        .with_threshold(40)
        .with_invert(true)
        .with_segments(6);
    assert_eq!(options.target_fps(), 12.5);
    assert_eq!(options.threshold(), 40);
    assert!(options.invert());
    assert_eq!(options.segments(), 6);
}

#[test]
fn options_clamp_zero_counts() {
    let options = RenderOptions::new().with_segments(0).with_batch_size(0);
    assert_eq!(options.segments(), 1);
    assert!(format!("{options:?}").contains("batch_size: 1"));
}

#[test]
fn options_with_cancellation() {
    let options = RenderOptions::new().with_cancellation(bitframe::CancellationToken::new());
    assert!(format!("{options:?}").contains("has_cancellation: true"));
}

#[test]
fn options_frame_output() {
    let output = FrameOutputOptions {
        pixel_format: PixelFormat::Gray8,
        width: Some(84),
        height: Some(48),
        maintain_aspect_ratio: false,
    };
    let debug = format!("{:?}", RenderOptions::new().with_frame_output(output));
    assert!(debug.contains("Gray8"));
    assert!(debug.contains("Some(84)"));
    assert!(debug.contains("maintain_aspect_ratio: false"));
}

// ── PixelFormat ────────────────────────────────────────────────────

#[test]
fn pixel_format_sizes() {
    assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
    assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
    assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
    assert_eq!(PixelFormat::default(), PixelFormat::Rgba8);
}

#[test]
fn pixel_format_names() {
    assert_eq!(PixelFormat::from_name("rgb8"), Some(PixelFormat::Rgb8));
    assert_eq!(PixelFormat::from_name("RGBA8"), Some(PixelFormat::Rgba8));
    assert_eq!(PixelFormat::from_name("gray8"), Some(PixelFormat::Gray8));
    assert_eq!(PixelFormat::from_name("yuv420p"), None);
}

// ── CacheOptions ───────────────────────────────────────────────────

#[test]
fn cache_options_budget() {
    assert_eq!(CacheOptions::new().max_bytes(), 512 * 1024 * 1024);
    assert_eq!(CacheOptions::default().with_max_bytes(10).max_bytes(), 10);
}
