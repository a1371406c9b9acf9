use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use bitframe::{
    BitframeError, CacheOptions, ContainerFormat, Dimensions, ExportMeta, FfmpegLogLevel,
    PixelFormat, Playback, ProgressCallback, ProgressInfo, RenderOptions, RenderSession,
    VideoSource,
    container::{self, DecodedContainer},
    ingest,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::imageops::{self, FilterType};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  bitframe metadata input.mp4 --json\n  bitframe render input.mp4 --out out/ --width 128 --height 64 --fps 30 --progress\n  bitframe render input.mp4 --out frames.h --format c-header --invert\n  bitframe inspect input-128x64@30.bin.gz --json\n  bitframe preview input-128x64@30.bin --frame 12 --out frame.png\n  bitframe completions zsh > _bitframe";

#[derive(Debug, Parser)]
#[command(
    name = "bitframe",
    version,
    about = "Render videos into 1-bit packed frame sequences and inspect the results",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print metadata for a video file (alias: probe).
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  bitframe metadata input.mp4\n  bitframe metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render a video into packed 1-bit frames and export them.
    #[command(
        about = "Render a video to packed frames",
        after_help = "Examples:\n  bitframe render input.mp4 --out out/ --width 128 --height 64\n  bitframe render input.mp4 --out bad-apple.json --format json-base64 --threshold 100"
    )]
    Render {
        /// Input video path.
        input: PathBuf,
        /// Output file, or an existing directory to write a shape-tagged file into.
        #[arg(long)]
        out: PathBuf,
        /// Output width in pixels.
        #[arg(long)]
        width: Option<u32>,
        /// Output height in pixels.
        #[arg(long)]
        height: Option<u32>,
        /// Frames captured per second of video.
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        /// Luminance at or above which a pixel is on.
        #[arg(long, default_value_t = 128)]
        threshold: u8,
        /// Swap on and off pixels.
        #[arg(long)]
        invert: bool,
        /// Container format (binary, binary-gzip, json-hex, json-base64, json-base64-gzip, c-header).
        #[arg(long)]
        format: Option<String>,
        /// Number of parallel capture segments.
        #[arg(long, default_value_t = 4)]
        segments: usize,
        /// Decoded pixel format handed to the packer (rgb8, rgba8, gray8).
        #[arg(long)]
        pixel_format: Option<String>,
        /// Title stored in JSON metadata and used as the C header prefix.
        #[arg(long)]
        title: Option<String>,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Decode an exported file and describe its frames.
    #[command(
        about = "Describe an exported frame file",
        after_help = "Examples:\n  bitframe inspect clip-128x64@30.bin\n  bitframe inspect frames.bin --width 128 --height 64 --fps 24 --json"
    )]
    Inspect {
        /// Exported file (binary, gzip, or JSON).
        file: PathBuf,
        /// Frame width, overriding the file name.
        #[arg(long)]
        width: Option<u32>,
        /// Frame height, overriding the file name.
        #[arg(long)]
        height: Option<u32>,
        /// Playback rate, overriding the file name.
        #[arg(long)]
        fps: Option<f64>,
        /// Output the description as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode one frame of an exported file to an image.
    #[command(
        about = "Save one decoded frame as an image",
        after_help = "Examples:\n  bitframe preview clip-128x64@30.bin --frame 0 --out first.png --scale 4"
    )]
    Preview {
        /// Exported file (binary, gzip, or JSON).
        file: PathBuf,
        /// Index of the frame to decode.
        #[arg(long, default_value_t = 0)]
        frame: usize,
        /// Output image path.
        #[arg(long)]
        out: PathBuf,
        /// Frame width, overriding the file name.
        #[arg(long)]
        width: Option<u32>,
        /// Frame height, overriding the file name.
        #[arg(long)]
        height: Option<u32>,
        /// Integer upscale factor for small frames.
        #[arg(long, default_value_t = 1)]
        scale: u32,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Some(level) = &global.log_level {
        let parsed = FfmpegLogLevel::from_name(level)
            .ok_or(format!("unsupported --log-level: {level}"))?;
        bitframe::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

/// Pick the container format from `--format`, then the output file name.
fn resolve_format(
    requested: Option<&str>,
    out: &Path,
) -> Result<ContainerFormat, Box<dyn std::error::Error>> {
    if let Some(name) = requested {
        return ContainerFormat::from_name(name)
            .ok_or_else(|| format!("unsupported --format: {name}").into());
    }
    let from_name = out
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(ContainerFormat::from_file_name);
    Ok(from_name.unwrap_or(ContainerFormat::BinaryGzip))
}

/// Frame shape from explicit flags, falling back to the file name.
fn resolve_dimensions(
    file: &Path,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
) -> Option<Dimensions> {
    let parsed = file
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| ingest::parse_file_name(name).ok());

    let mut dimensions = match (width, height, parsed) {
        (Some(width), Some(height), parsed) => Dimensions {
            fps: parsed.and_then(|dims| dims.fps),
            ..Dimensions::new(width, height)
        },
        (width, height, Some(parsed)) => Dimensions {
            width: width.unwrap_or(parsed.width),
            height: height.unwrap_or(parsed.height),
            fps: parsed.fps,
        },
        _ => return None,
    };
    if let Some(fps) = fps {
        dimensions = dimensions.with_fps(fps);
    }
    Some(dimensions)
}

fn load_container(
    file: &Path,
    dimensions: Option<Dimensions>,
) -> Result<DecodedContainer, Box<dyn std::error::Error>> {
    let bytes = fs::read(file)?;
    match container::decode_container(&bytes, dimensions) {
        Ok(decoded) => Ok(decoded),
        Err(BitframeError::DecodeError { field, .. }) if field == "width" => {
            let payload = ingest::load_binary(&bytes)?;
            let candidates = ingest::detect_possible_resolutions(payload.len());
            if candidates.is_empty() {
                return Err(format!(
                    "{} has no WIDTHxHEIGHT@FPS in its name; pass --width and --height",
                    file.display()
                )
                .into());
            }
            let hints: Vec<String> = candidates
                .iter()
                .map(|candidate| {
                    format!(
                        "{}x{} ({})",
                        candidate.width, candidate.height, candidate.aspect_ratio
                    )
                })
                .collect();
            Err(format!(
                "{} has no WIDTHxHEIGHT@FPS in its name; pass --width and --height (possible: {})",
                file.display(),
                hints.join(", ")
            )
            .into())
        }
        Err(error) => Err(error.into()),
    }
}

/// Drives an indicatif bar from render progress callbacks.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(remaining) = info.estimated_remaining {
            self.bar.set_message(format!("eta {}s", remaining.as_secs()));
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Metadata { input, json } => {
            let source = VideoSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Duration: {:?}", metadata.duration);
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    metadata.width, metadata.height, metadata.frames_per_second, metadata.codec,
                );
                println!("Frames: {}", metadata.frame_count);
            }
        }
        Commands::Render {
            input,
            out,
            width,
            height,
            fps,
            threshold,
            invert,
            format,
            segments,
            pixel_format,
            title,
            progress,
        } => {
            if fps <= 0.0 {
                return Err("--fps must be greater than 0".into());
            }
            if segments == 0 {
                return Err("--segments must be greater than 0".into());
            }
            let requested = resolve_format(format.as_deref(), &out)?;

            let source = VideoSource::open(&input)?;
            let mut options = RenderOptions::new()
                .with_resolution(width, height)
                .with_target_fps(fps)
                .with_threshold(threshold)
                .with_invert(invert)
                .with_segments(segments);
            if let Some(name) = &pixel_format {
                let parsed = PixelFormat::from_name(name)
                    .ok_or(format!("unsupported --pixel-format: {name}"))?;
                options = options.with_pixel_format(parsed);
            }

            let bar = if progress {
                let callback = Arc::new(BarProgress::new()?);
                options = options.with_progress(callback.clone()).with_batch_size(1);
                Some(callback)
            } else {
                None
            };

            let mut session = RenderSession::new();
            let rendered = session.render(&source, &options);
            if let Some(callback) = &bar {
                callback.bar.finish_with_message("done");
            }
            rendered?;
            let stats = session.snapshot();
            let sequence = session
                .take_sequence()
                .ok_or("render finished without a sequence")?;

            let stem = input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(container::DEFAULT_TITLE);
            let mut meta = ExportMeta::from_sequence(
                input
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(stem),
                &sequence,
            );
            if let Some(title) = title {
                meta = meta.with_title(title);
            }

            let encoded = container::export(requested, sequence.frames(), &meta)?;
            if encoded.format != requested {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{requested} is unavailable, wrote {} instead", encoded.format)
                        .yellow()
                );
            }

            let output_path = if out.is_dir() {
                out.join(container::export_file_name(stem, &meta, encoded.format))
            } else {
                out
            };
            ensure_writable_path(&output_path, cli.global.overwrite)?;
            fs::write(&output_path, &encoded.bytes)?;

            if cli.global.verbose {
                eprintln!(
                    "rendered {} frames in {} ms ({:.1} fps)",
                    stats.current, stats.elapsed_ms, stats.render_fps
                );
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Wrote {} frame(s) of {}x{} to {} ({} bytes)",
                    sequence.len(),
                    sequence.width(),
                    sequence.height(),
                    output_path.display(),
                    encoded.bytes.len()
                )
                .green()
            );
        }
        Commands::Inspect {
            file,
            width,
            height,
            fps,
            json,
        } => {
            let dimensions = resolve_dimensions(&file, width, height, fps);
            debug!("Inspecting {} with {dimensions:?}", file.display());
            let decoded = load_container(&file, dimensions)?;
            let sequence = &decoded.sequence;
            let meta = sequence.meta();
            let lit: u64 = sequence
                .frames()
                .iter()
                .flat_map(|frame| frame.as_bytes())
                .map(|byte| u64::from(byte.count_ones()))
                .sum();

            if json {
                let payload = json!({
                    "file": file.display().to_string(),
                    "width": meta.width,
                    "height": meta.height,
                    "frames": sequence.len(),
                    "fps": meta.fps,
                    "duration_seconds": meta.duration,
                    "bytes_per_frame": meta.bytes_per_frame,
                    "lit_bits": lit,
                    "meta": decoded.meta,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("File: {}", file.display());
                println!(
                    "Frames: {} of {}x{} ({} bytes each)",
                    sequence.len(),
                    meta.width,
                    meta.height,
                    meta.bytes_per_frame
                );
                println!("Rate: {:.3} fps over {:.3}s", meta.fps, meta.duration);
                println!("Lit bits: {lit}");
                if let Some(embedded) = &decoded.meta {
                    println!("Title: {}", embedded.title);
                    if !embedded.source.is_empty() {
                        println!("Source: {}", embedded.source);
                    }
                    println!(
                        "Threshold: {}{}",
                        embedded.threshold,
                        if embedded.invert { " (inverted)" } else { "" }
                    );
                }
            }
        }
        Commands::Preview {
            file,
            frame,
            out,
            width,
            height,
            scale,
        } => {
            if scale == 0 {
                return Err("--scale must be greater than 0".into());
            }
            ensure_writable_path(&out, cli.global.overwrite)?;

            let dimensions = resolve_dimensions(&file, width, height, None);
            let decoded = load_container(&file, dimensions)?;
            // A zero budget skips the full cache build; only one frame is needed.
            let playback = Playback::new(decoded.sequence, &CacheOptions::new().with_max_bytes(0));
            let bitmap = playback.frame(frame)?.into_owned();

            let bitmap = if scale > 1 {
                imageops::resize(
                    &bitmap,
                    bitmap.width() * scale,
                    bitmap.height() * scale,
                    FilterType::Nearest,
                )
            } else {
                bitmap
            };
            bitmap.save(&out)?;

            println!(
                "{} {}",
                "saved".green().bold(),
                format!("frame {frame} -> {}", out.display()).green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "bitframe", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
