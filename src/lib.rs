//! # reelcut
//!
//! Turn long videos into short vertical highlight clips.
//!
//! For every source video, `reelcut` finds the most energetic 60-second
//! window (a weighted mix of audio level and frame-to-frame motion),
//! reframes it to a 9:16 portrait at 1920 px height, normalizes its audio,
//! adds one-second fades and a gently bobbing logo, and encodes the result
//! as `edit_{YYYYMMDD_HHMMSS}_{name}`. Decoding, filtering and encoding run
//! through FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate.
//!
//! ## Quick Start
//!
//! ### Render one file
//!
//! ```no_run
//! use reelcut::{RenderConfig, RenderPipeline};
//!
//! let pipeline = RenderPipeline::new(RenderConfig::new("videos_editados", "logo.png"));
//! let clip = pipeline.render("videos_descargados/match.mp4").unwrap();
//! println!("{} ({}x{})", clip.output.display(), clip.dimensions.0, clip.dimensions.1);
//! ```
//!
//! ### Find the best window only
//!
//! ```no_run
//! use reelcut::{Deadline, MediaFile, ScoringConfig, SegmentScorer};
//!
//! let mut media = MediaFile::open("match.mp4").unwrap();
//! let scorer = SegmentScorer::new(ScoringConfig::default());
//! let window = scorer.best_window(&mut media, &Deadline::unbounded()).unwrap();
//! println!("{:?}..{:?}", window.start, window.end);
//! ```
//!
//! ### Process a directory
//!
//! ```no_run
//! use reelcut::{BatchRunner, RenderConfig, RenderPipeline};
//!
//! let config = RenderConfig::new("videos_editados", "logo.png").with_delete_source(true);
//! let report = BatchRunner::new(RenderPipeline::new(config))
//!     .run("videos_descargados")
//!     .unwrap();
//! println!("{} rendered, {} failed", report.rendered(), report.failed());
//! ```
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Per-window scoring distributed across rayon threads |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod audio;
pub mod batch;
pub mod config;
mod conversion;
pub mod encode;
pub mod error;
pub mod fade;
pub mod ffmpeg;
pub mod loudness;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod publish;
#[cfg(feature = "rayon")]
mod rayon;
pub mod reframe;
pub mod scoring;
mod video;
pub mod watermark;

pub use audio::AudioBuffer;
pub use batch::{
    BatchReport, BatchRunner, PublishRecord, VIDEO_EXTENSIONS, collect_inputs, is_video_file,
};
pub use config::{
    AudioOutputConfig, FadeConfig, ReframeConfig, RenderConfig, ScoringConfig, ScoringMode,
    VideoOutputConfig, WatermarkConfig,
};
pub use encode::{ClipEncoder, ClipEncoderSettings, container_for};
pub use error::ReelcutError;
pub use fade::Fades;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use loudness::{AudioConditioner, LoudnessInfo};
pub use media::MediaFile;
pub use metadata::{AudioMetadata, MediaMetadata, VideoMetadata};
pub use pipeline::{
    RenderOutcome, RenderPipeline, RenderStage, RenderedClip, output_file_name,
};
pub use progress::{Deadline, OperationType, ProgressCallback, ProgressInfo};
pub use publish::{DirectoryPublisher, Publisher};
pub use reframe::{CropRect, ReframePlan, Reframer};
pub use scoring::{
    CandidateScore, EnergyProbe, SegmentScorer, SignalProfile, Window, WindowDecoder,
    candidate_windows, frame_difference, score_window, select_best_window,
};
pub use watermark::{WatermarkCompositor, WatermarkSpec, logo_scale};
