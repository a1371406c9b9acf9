//! FFmpeg log level configuration.
//!
//! FFmpeg prints decoder warnings to stderr on its own, independent of the
//! [`log`](https://crates.io/crates/log) facade used by the rest of the
//! crate. A render opens one decoder per segment, so noisy files repeat
//! every warning several times; [`set_ffmpeg_log_level`] tunes that output
//! without importing `ffmpeg-next` directly.
//!
//! ```no_run
//! use bitframe::{FfmpegLogLevel, VideoSource};
//!
//! bitframe::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let source = VideoSource::open("input.mp4").unwrap();
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, most quiet first.
///
/// Setting a level suppresses every FFmpeg message below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Conditions the process cannot survive.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    const NAMES: [(FfmpegLogLevel, &'static str); 9] = [
        (FfmpegLogLevel::Quiet, "quiet"),
        (FfmpegLogLevel::Panic, "panic"),
        (FfmpegLogLevel::Fatal, "fatal"),
        (FfmpegLogLevel::Error, "error"),
        (FfmpegLogLevel::Warning, "warning"),
        (FfmpegLogLevel::Info, "info"),
        (FfmpegLogLevel::Verbose, "verbose"),
        (FfmpegLogLevel::Debug, "debug"),
        (FfmpegLogLevel::Trace, "trace"),
    ];

    /// Parse a level name as accepted by `ffmpeg -loglevel`.
    pub fn from_name(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        let value = if value == "warn" { "warning" } else { value.as_str() };
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == value)
            .map(|(level, _)| *level)
    }

    /// The `ffmpeg -loglevel` name of this level.
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(level, _)| *level == self)
            .map_or("warning", |(_, name)| name)
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Set FFmpeg's internal log verbosity.
///
/// Does not affect messages emitted through the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// FFmpeg's current internal log verbosity, if it maps to a known level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for (level, name) in FfmpegLogLevel::NAMES {
            assert_eq!(FfmpegLogLevel::from_name(name), Some(level));
            assert_eq!(level.name(), name);
        }
        assert_eq!(FfmpegLogLevel::from_name("WARN"), Some(FfmpegLogLevel::Warning));
        assert_eq!(FfmpegLogLevel::from_name("loud"), None);
    }
}
