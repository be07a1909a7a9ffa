//! Render configuration.
//!
//! [`RenderConfig`] gathers every constant the pipeline depends on (window
//! length, scoring weights, crop ratio, watermark geometry, fade lengths,
//! codec settings) into one immutable value handed to
//! [`RenderPipeline::new`](crate::RenderPipeline::new). The defaults
//! reproduce the stock 60-second vertical edit.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use reelcut::{RenderConfig, RenderPipeline};
//!
//! let config = RenderConfig::new("videos_editados", "logo.png")
//!     .with_target_duration(Duration::from_secs(45))
//!     .with_timeout(Some(Duration::from_secs(300)))
//!     .with_delete_source(false);
//! let pipeline = RenderPipeline::new(config);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::progress::{NoOpProgress, ProgressCallback};

/// How candidate windows are measured by the segment scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoringMode {
    /// Decode the whole source once, bucket the signals per second and slide
    /// a window sum over the buckets. This is the default.
    #[default]
    SinglePass,
    /// Re-decode every candidate window independently. With the `rayon`
    /// feature the candidates are measured in parallel.
    PerWindow,
}

/// Highlight-selection settings.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Length of the selected window, and the threshold above which a
    /// source is trimmed.
    pub target_duration: Duration,
    /// Distance between consecutive candidate start offsets.
    pub stride: Duration,
    /// Weight of the mean absolute audio amplitude.
    pub audio_weight: f64,
    /// Weight of the summed inter-frame difference.
    pub motion_weight: f64,
    /// Sample rate audio is decoded at before measuring.
    pub audio_sample_rate: u32,
    /// Measurement strategy.
    pub mode: ScoringMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            target_duration: Duration::from_secs(60),
            stride: Duration::from_secs(5),
            audio_weight: 0.6,
            motion_weight: 0.4,
            audio_sample_rate: 22_000,
            mode: ScoringMode::SinglePass,
        }
    }
}

/// Zoom, crop and scale settings for the vertical canvas.
#[derive(Debug, Clone, Copy)]
pub struct ReframeConfig {
    /// Uniform magnification applied before cropping.
    pub zoom: f64,
    /// Target width / height ratio.
    pub target_ratio: f64,
    /// Output height in pixels.
    pub target_height: u32,
}

impl Default for ReframeConfig {
    fn default() -> Self {
        Self {
            zoom: 1.05,
            target_ratio: 9.0 / 16.0,
            target_height: 1920,
        }
    }
}

/// Watermark geometry.
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    /// Path of the logo image (PNG with alpha recommended).
    pub logo_path: PathBuf,
    /// Open interval of clip aspect ratios that get the compact logo size.
    pub compact_ratio_range: (f64, f64),
    /// Logo height as a fraction of clip height inside the compact range.
    pub compact_scale: f64,
    /// Logo height as a fraction of clip height otherwise.
    pub default_scale: f64,
    /// Transparent padding to the right of the logo, in pixels.
    pub margin_right: u32,
    /// Transparent padding below the logo, in pixels.
    pub margin_bottom: u32,
    /// Top of the padded logo box as a fraction of clip height.
    pub vertical_anchor: f64,
    /// Amplitude of the vertical bob, in pixels.
    pub bob_amplitude: f64,
}

impl WatermarkConfig {
    /// Default geometry for the given logo.
    pub fn new<P: AsRef<Path>>(logo_path: P) -> Self {
        Self {
            logo_path: logo_path.as_ref().to_path_buf(),
            compact_ratio_range: (0.55, 0.65),
            compact_scale: 0.08,
            default_scale: 0.13,
            margin_right: 30,
            margin_bottom: 100,
            vertical_anchor: 0.92,
            bob_amplitude: 3.0,
        }
    }
}

/// Fade lengths at the clip boundaries.
#[derive(Debug, Clone, Copy)]
pub struct FadeConfig {
    /// Fade-in from black / silence.
    pub fade_in: Duration,
    /// Fade-out to black / silence.
    pub fade_out: Duration,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_secs(1),
            fade_out: Duration::from_secs(1),
        }
    }
}

/// Output audio settings.
#[derive(Debug, Clone, Copy)]
pub struct AudioOutputConfig {
    /// Output sample rate in hertz.
    pub sample_rate: u32,
    /// Output channel count (1 or 2).
    pub channels: u16,
    /// Peak level the normalizer scales to (1.0 = 0 dBFS).
    pub target_peak: f32,
    /// AAC bit rate in bits per second.
    pub bit_rate: usize,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            target_peak: 1.0,
            bit_rate: 128_000,
        }
    }
}

/// Output video settings.
#[derive(Debug, Clone)]
pub struct VideoOutputConfig {
    /// Constant Rate Factor for H.264 (0-51, lower is better).
    pub crf: u32,
    /// x264 preset name.
    pub preset: String,
    /// Frame rate used when the source does not report one.
    pub fallback_frames_per_second: f64,
}

impl Default for VideoOutputConfig {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "medium".to_string(),
            fallback_frames_per_second: 30.0,
        }
    }
}

/// Complete configuration for [`RenderPipeline`](crate::RenderPipeline).
///
/// Built once and never mutated by the pipeline, so tests can run the same
/// code with alternate constants.
#[derive(Clone)]
pub struct RenderConfig {
    pub(crate) output_dir: PathBuf,
    pub(crate) scoring: ScoringConfig,
    pub(crate) reframe: ReframeConfig,
    pub(crate) watermark: WatermarkConfig,
    pub(crate) fades: FadeConfig,
    pub(crate) audio: AudioOutputConfig,
    pub(crate) video: VideoOutputConfig,
    /// Remove the source after a durable, successful encode.
    pub(crate) delete_source: bool,
    /// Per-file time limit. `None` disables the guard.
    pub(crate) timeout: Option<Duration>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for RenderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderConfig")
            .field("output_dir", &self.output_dir)
            .field("scoring", &self.scoring)
            .field("reframe", &self.reframe)
            .field("watermark", &self.watermark)
            .field("fades", &self.fades)
            .field("audio", &self.audio)
            .field("video", &self.video)
            .field("delete_source", &self.delete_source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RenderConfig {
    /// Create a configuration writing into `output_dir` and watermarking
    /// with the logo at `logo_path`.
    ///
    /// Defaults: 60 s window, 5 s stride, weights 0.6 / 0.4, zoom 1.05,
    /// 9:16 at 1920 px, 1 s fades, 44.1 kHz stereo AAC, source deleted
    /// after success, 10 minute time limit.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(output_dir: P, logo_path: L) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            scoring: ScoringConfig::default(),
            reframe: ReframeConfig::default(),
            watermark: WatermarkConfig::new(logo_path),
            fades: FadeConfig::default(),
            audio: AudioOutputConfig::default(),
            video: VideoOutputConfig::default(),
            delete_source: true,
            timeout: Some(Duration::from_secs(600)),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set the window length.
    #[must_use]
    pub fn with_target_duration(mut self, duration: Duration) -> Self {
        self.scoring.target_duration = duration;
        self
    }

    /// Replace the scoring settings.
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Select the scoring strategy.
    #[must_use]
    pub fn with_scoring_mode(mut self, mode: ScoringMode) -> Self {
        self.scoring.mode = mode;
        self
    }

    /// Replace the reframing settings.
    #[must_use]
    pub fn with_reframe(mut self, reframe: ReframeConfig) -> Self {
        self.reframe = reframe;
        self
    }

    /// Replace the watermark settings.
    #[must_use]
    pub fn with_watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.watermark = watermark;
        self
    }

    /// Replace the fade lengths.
    #[must_use]
    pub fn with_fades(mut self, fades: FadeConfig) -> Self {
        self.fades = fades;
        self
    }

    /// Replace the output audio settings.
    #[must_use]
    pub fn with_audio_output(mut self, audio: AudioOutputConfig) -> Self {
        self.audio = audio;
        self
    }

    /// Replace the output video settings.
    #[must_use]
    pub fn with_video_output(mut self, video: VideoOutputConfig) -> Self {
        self.video = video;
        self
    }

    /// Control whether the source file is removed after a successful render.
    #[must_use]
    pub fn with_delete_source(mut self, delete: bool) -> Self {
        self.delete_source = delete;
        self
    }

    /// Set the per-file time limit. `None` disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a progress callback, fired while frames are encoded.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Directory rendered clips are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Window length.
    pub fn target_duration(&self) -> Duration {
        self.scoring.target_duration
    }

    /// Scoring settings.
    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Reframing settings.
    pub fn reframe(&self) -> &ReframeConfig {
        &self.reframe
    }

    /// Watermark settings.
    pub fn watermark(&self) -> &WatermarkConfig {
        &self.watermark
    }

    /// Fade lengths.
    pub fn fades(&self) -> &FadeConfig {
        &self.fades
    }

    /// Output audio settings.
    pub fn audio_output(&self) -> &AudioOutputConfig {
        &self.audio
    }

    /// Output video settings.
    pub fn video_output(&self) -> &VideoOutputConfig {
        &self.video
    }

    /// Whether sources are removed after success.
    pub fn delete_source(&self) -> bool {
        self.delete_source
    }

    /// Per-file time limit.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
