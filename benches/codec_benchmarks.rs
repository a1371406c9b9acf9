//! Benchmarks for packing, unpacking, containers, and full renders.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! The video render benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use bitframe::cache::decode_bitmap;
use bitframe::container::{self, ContainerFormat, ExportMeta};
use bitframe::{
    CacheOptions, FfmpegLogLevel, MemorySource, PixelBuffer, PixelFormat, PlaybackCache,
    RenderOptions, RenderSession, VideoSource, codec,
};
use criterion::{BenchmarkId, Criterion};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// A diagonal gradient, so roughly half the pixels pass a mid threshold.
fn gradient(width: u32, height: u32, format: PixelFormat) -> PixelBuffer {
    let bpp = format.bytes_per_pixel();
    let mut data = Vec::with_capacity(width as usize * height as usize * bpp);
    for y in 0..height {
        for x in 0..width {
            let value = ((x + y) * 255 / (width + height)) as u8;
            for channel in 0..bpp {
                data.push(if channel == 3 { 255 } else { value });
            }
        }
    }
    PixelBuffer::new(width, height, format, data).unwrap()
}

fn benchmark_pack(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("pack");
    for (width, height) in [(128, 64), (480, 360), (1280, 720)] {
        for format in [PixelFormat::Gray8, PixelFormat::Rgba8] {
            let pixels = gradient(width, height, format);
            group.bench_with_input(
                BenchmarkId::new(format!("{format:?}"), format!("{width}x{height}")),
                &pixels,
                |bencher, pixels| bencher.iter(|| codec::pack(pixels, 128, false)),
            );
        }
    }
    group.finish();
}

fn benchmark_unpack(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("unpack");
    for (width, height) in [(128, 64), (480, 360)] {
        let packed = codec::pack(&gradient(width, height, PixelFormat::Gray8), 128, false);
        group.bench_function(format!("rgba {width}x{height}"), |bencher| {
            bencher.iter(|| codec::unpack(packed.as_bytes(), width, height).unwrap())
        });
        group.bench_function(format!("bitmap {width}x{height}"), |bencher| {
            bencher.iter(|| decode_bitmap(packed.as_bytes(), width, height))
        });
    }
    group.finish();
}

fn benchmark_containers(criterion: &mut Criterion) {
    let frames: Vec<PixelBuffer> = (0..120)
        .map(|_| gradient(128, 64, PixelFormat::Gray8))
        .collect();
    let source = MemorySource::new(frames, 30.0).unwrap();
    let mut session = RenderSession::new();
    session
        .render(&source, &RenderOptions::new().with_target_fps(30.0))
        .unwrap();
    let sequence = session.take_sequence().unwrap();
    let meta = ExportMeta::from_sequence("bench", &sequence);

    let mut group = criterion.benchmark_group("containers");
    for format in ContainerFormat::ALL {
        group.bench_function(format!("export {format}"), |bencher| {
            bencher.iter(|| container::export(format, sequence.frames(), &meta).unwrap())
        });
    }
    let json = container::to_json_base64(sequence.frames(), &meta).unwrap();
    group.bench_function("decode json-base64", |bencher| {
        bencher.iter(|| container::decode_container(json.as_bytes(), None).unwrap())
    });
    group.bench_function("playback cache build", |bencher| {
        bencher.iter(|| {
            PlaybackCache::build(sequence.frames(), 128, 64, &CacheOptions::new()).unwrap()
        })
    });
    group.finish();
}

fn benchmark_memory_render(criterion: &mut Criterion) {
    let frames: Vec<PixelBuffer> = (0..60)
        .map(|_| gradient(320, 240, PixelFormat::Rgba8))
        .collect();
    let source = MemorySource::new(frames, 30.0).unwrap();

    let mut group = criterion.benchmark_group("memory render");
    group.sample_size(20);
    for segments in [1, 2, 4] {
        group.bench_function(format!("{segments} segments"), |bencher| {
            bencher.iter(|| {
                let options = RenderOptions::new()
                    .with_target_fps(30.0)
                    .with_resolution(Some(128), Some(64))
                    .with_segments(segments);
                let mut session = RenderSession::new();
                session.render(&source, &options).unwrap();
            })
        });
    }
    group.finish();
}

fn benchmark_video_render(criterion: &mut Criterion) {
    bitframe::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }
    let source = VideoSource::open(SAMPLE_VIDEO).unwrap();

    let mut group = criterion.benchmark_group("video render");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));
    for segments in [1, 4] {
        group.bench_function(format!("128x96 @ 10 fps, {segments} segments"), |bencher| {
            bencher.iter(|| {
                let options = RenderOptions::new()
                    .with_target_fps(10.0)
                    .with_resolution(Some(128), None)
                    .with_segments(segments);
                let mut session = RenderSession::new();
                session.render(&source, &options).unwrap();
            })
        });
    }
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_pack,
    benchmark_unpack,
    benchmark_containers,
    benchmark_memory_render,
    benchmark_video_render,
);
criterion::criterion_main!(benches);
