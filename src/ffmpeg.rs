//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr independently of the `log`
//! crate. Batch runs over many files make that output noisy, so the CLI and
//! library users can tune it here without depending on `ffmpeg-next`.
//!
//! ```no_run
//! use reelcut::FfmpegLogLevel;
//!
//! reelcut::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::{fmt, str::FromStr};

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log level, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Unrecoverable conditions that abort the process.
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
    /// Tracing output.
    Trace,
}

impl FfmpegLogLevel {
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

    /// The matching `log` crate filter for Rust-side diagnostics.
    pub fn as_log_filter(self) -> log::LevelFilter {
        match self {
            FfmpegLogLevel::Quiet => log::LevelFilter::Off,
            FfmpegLogLevel::Panic | FfmpegLogLevel::Fatal | FfmpegLogLevel::Error => {
                log::LevelFilter::Error
            }
            FfmpegLogLevel::Warning => log::LevelFilter::Warn,
            FfmpegLogLevel::Info | FfmpegLogLevel::Verbose => log::LevelFilter::Info,
            FfmpegLogLevel::Debug => log::LevelFilter::Debug,
            FfmpegLogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            _ => Err(format!(
                "invalid log level '{value}', expected one of quiet|panic|fatal|error|warning|info|verbose|debug|trace"
            )),
        }
    }
}

impl fmt::Display for FfmpegLogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Panic => "panic",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
            FfmpegLogLevel::Trace => "trace",
        };
        formatter.write_str(name)
    }
}

/// Set what FFmpeg prints to stderr. Rust-side `log` output is unaffected.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// The current FFmpeg log level, if it maps to a known variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("warn".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Warning));
        assert_eq!("ERROR".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Error));
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for level in [
            FfmpegLogLevel::Quiet,
            FfmpegLogLevel::Warning,
            FfmpegLogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<FfmpegLogLevel>(), Ok(level));
        }
    }

    #[test]
    fn quiet_disables_rust_logging() {
        assert_eq!(FfmpegLogLevel::Quiet.as_log_filter(), log::LevelFilter::Off);
        assert_eq!(FfmpegLogLevel::Debug.as_log_filter(), log::LevelFilter::Debug);
    }
}
