//! Per-file render pipeline.
//!
//! [`RenderPipeline`] turns one source video into one vertical clip:
//!
//! ```text
//! Pending → Opened → Trimmed → Zoomed → Reframed → AudioNormalized
//!         → Faded → Watermarked → Encoded → Closed
//! ```
//!
//! Any stage may end in `Failed`; a failed outcome names the last stage
//! that completed, so a source that never opens reports `Pending`. The logo
//! is loaded as soon as the source opens. Every handle (demuxer, encoder,
//! logo) is owned by the render call and released on every exit path; the output is
//! written to a hidden temporary file and only renamed into place after it
//! has been flushed to disk. The source is deleted only after that rename.
//!
//! # Example
//!
//! ```no_run
//! use reelcut::{RenderConfig, RenderOutcome, RenderPipeline};
//!
//! let pipeline = RenderPipeline::new(
//!     RenderConfig::new("videos_editados", "logo.png").with_delete_source(false),
//! );
//! match pipeline.process("videos_descargados/clip.mp4") {
//!     RenderOutcome::Rendered { output, .. } => println!("wrote {}", output.display()),
//!     RenderOutcome::Failed { error, .. } => eprintln!("failed: {error}"),
//! }
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::Local;

use crate::{
    audio::{self, AudioBuffer},
    config::RenderConfig,
    encode::{ClipEncoder, ClipEncoderSettings, container_for},
    error::ReelcutError,
    fade::Fades,
    loudness::AudioConditioner,
    media::MediaFile,
    progress::{Deadline, OperationType, ProgressTracker},
    reframe::{ReframePlan, Reframer},
    scoring::{SegmentScorer, Window},
    video,
    watermark::{WatermarkCompositor, WatermarkSpec},
};

/// Lifecycle stages of one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Nothing done yet.
    Pending,
    /// Source opened and probed.
    Opened,
    /// Window selected.
    Trimmed,
    /// Zoom applied to the geometry.
    Zoomed,
    /// Crop and scale resolved.
    Reframed,
    /// Window audio decoded and normalized.
    AudioNormalized,
    /// Fade envelope applied.
    Faded,
    /// Logo overlay prepared for the clip.
    Watermarked,
    /// Output durably written.
    Encoded,
    /// Every handle released.
    Closed,
    /// The render stopped early.
    Failed,
}

impl Display for RenderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            RenderStage::Pending => "pending",
            RenderStage::Opened => "opened",
            RenderStage::Trimmed => "trimmed",
            RenderStage::Zoomed => "zoomed",
            RenderStage::Reframed => "reframed",
            RenderStage::AudioNormalized => "audio-normalized",
            RenderStage::Faded => "faded",
            RenderStage::Watermarked => "watermarked",
            RenderStage::Encoded => "encoded",
            RenderStage::Closed => "closed",
            RenderStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A successfully rendered clip.
#[derive(Debug, Clone)]
pub struct RenderedClip {
    /// The source that was rendered.
    pub source: PathBuf,
    /// Final output path.
    pub output: PathBuf,
    /// The part of the source that was used.
    pub window: Window,
    /// Output frame size.
    pub dimensions: (u32, u32),
    /// Number of encoded video frames.
    pub frames: u64,
    /// Whether the source file was removed.
    pub source_deleted: bool,
}

/// Result of processing one file.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The clip was written.
    Rendered {
        /// The source that was rendered.
        source: PathBuf,
        /// Final output path.
        output: PathBuf,
        /// The part of the source that was used.
        window: Window,
    },
    /// The render stopped early; the source is untouched.
    Failed {
        /// The source that failed.
        source: PathBuf,
        /// Last stage reached before the failure.
        stage: RenderStage,
        /// What went wrong.
        error: ReelcutError,
    },
}

impl RenderOutcome {
    /// `true` for [`RenderOutcome::Rendered`].
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered { .. })
    }

    /// The source path of either variant.
    pub fn source(&self) -> &Path {
        match self {
            RenderOutcome::Rendered { source, .. } | RenderOutcome::Failed { source, .. } => source,
        }
    }

    /// The output path of a rendered clip.
    pub fn output(&self) -> Option<&Path> {
        match self {
            RenderOutcome::Rendered { output, .. } => Some(output),
            RenderOutcome::Failed { .. } => None,
        }
    }
}

/// Output file name for a source `basename` rendered at `timestamp`
/// (`YYYYMMDD_HHMMSS`).
pub fn output_file_name(basename: &str, timestamp: &str) -> String {
    format!("edit_{timestamp}_{basename}")
}

/// A not-yet-published output file.
///
/// Removed on drop unless [`commit`](PartialOutput::commit) succeeded.
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn new(directory: &Path, final_name: &str) -> Self {
        Self {
            path: directory.join(format!(".{final_name}.partial")),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Flush to disk, rename to `destination` and sync the directory.
    fn commit(mut self, destination: &Path) -> Result<(), ReelcutError> {
        let file = File::open(&self.path)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.path, destination)?;
        self.committed = true;

        // Sync parent directory for durability
        if let Some(parent) = destination.parent()
            && let Ok(directory) = File::open(parent)
        {
            let _ = directory.sync_all();
        }
        Ok(())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(error) = fs::remove_file(&self.path) {
                log::warn!(
                    "Could not remove partial output {}: {error}",
                    self.path.display()
                );
            }
        }
    }
}

/// Renders individual files according to a [`RenderConfig`].
///
/// Holds no per-file state; one pipeline can process any number of files
/// one after another.
pub struct RenderPipeline {
    config: RenderConfig,
}

impl RenderPipeline {
    /// Create a pipeline.
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `source`, converting every error into
    /// [`RenderOutcome::Failed`].
    pub fn process<P: AsRef<Path>>(&self, source: P) -> RenderOutcome {
        let source = source.as_ref();
        let mut stage = RenderStage::Pending;
        match self.render_tracked(source, &mut stage) {
            Ok(clip) => RenderOutcome::Rendered {
                source: clip.source,
                output: clip.output,
                window: clip.window,
            },
            Err(error) => {
                log::debug!("{}: {stage} -> {}", source.display(), RenderStage::Failed);
                log::error!(
                    "Failed to render {} after stage '{stage}': {error}",
                    source.display()
                );
                RenderOutcome::Failed {
                    source: source.to_path_buf(),
                    stage,
                    error,
                }
            }
        }
    }

    /// Render `source` and return details of the written clip.
    ///
    /// # Errors
    ///
    /// - [`ReelcutError::SourceUnreadable`] if the source cannot be opened.
    /// - [`ReelcutError::AssetMissing`] if the logo cannot be loaded.
    /// - [`ReelcutError::DecodeFailure`] if decoding the window fails.
    /// - [`ReelcutError::EncodeFailure`] if the output cannot be written.
    /// - [`ReelcutError::Timeout`] if the per-file time limit expires.
    pub fn render<P: AsRef<Path>>(&self, source: P) -> Result<RenderedClip, ReelcutError> {
        let mut stage = RenderStage::Pending;
        self.render_tracked(source.as_ref(), &mut stage)
    }

    fn render_tracked(
        &self,
        source: &Path,
        stage: &mut RenderStage,
    ) -> Result<RenderedClip, ReelcutError> {
        let config = &self.config;
        let deadline = Deadline::after(config.timeout);
        log::info!("Rendering {}", source.display());

        // Opened
        let mut media = MediaFile::open(source)?;
        let video_metadata = media.video_metadata()?.clone();
        let duration = media.metadata().duration;
        if duration.is_zero() {
            return Err(ReelcutError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: "source reports no duration".to_string(),
            });
        }
        advance(stage, RenderStage::Opened, source);

        // Geometry and logo are resolved before scoring.
        let plan = ReframePlan::new(video_metadata.width, video_metadata.height, &config.reframe)?;
        let spec = WatermarkSpec::for_clip(plan.output_width, plan.output_height, &config.watermark);
        let compositor = WatermarkCompositor::load(&config.watermark.logo_path, spec)?;

        // Trimmed
        let scorer = SegmentScorer::new(config.scoring.clone())
            .with_progress(Arc::clone(&config.progress));
        let window = scorer.best_window(&mut media, &deadline)?;
        advance(stage, RenderStage::Trimmed, source);

        // Zoomed + Reframed
        advance(stage, RenderStage::Zoomed, source);
        let time_base = media
            .video_stream_index
            .and_then(|index| media.input_context.stream(index))
            .map(|stream| stream.time_base())
            .ok_or(ReelcutError::NoVideoStream)?;
        let mut reframer = Reframer::new(plan, time_base);
        log::debug!(
            "Reframing {}x{} -> {}x{} (crop {:?})",
            plan.source_width,
            plan.source_height,
            plan.output_width,
            plan.output_height,
            plan.crop,
        );
        advance(stage, RenderStage::Reframed, source);

        // AudioNormalized
        let audio = if media.has_audio() {
            let decoded = audio::decode_range(
                &mut media,
                window.start,
                window.end,
                config.audio.sample_rate,
                config.audio.channels,
                &deadline,
            )
            .map_err(as_decode_failure)?;
            AudioConditioner::new(config.audio.target_peak).normalize(Some(decoded))
        } else {
            log::debug!("{} has no audio track", source.display());
            None
        };
        advance(stage, RenderStage::AudioNormalized, source);

        // Faded
        let fades = Fades::from_config(&config.fades, window.length());
        let audio = audio.map(|mut buffer| {
            fades.apply_to_audio(&mut buffer);
            buffer
        });
        advance(stage, RenderStage::Faded, source);

        // Watermarked
        let (logo_width, logo_height) = compositor.logo_dimensions();
        let (x, y) = compositor.position(0.0);
        log::debug!("Overlaying {logo_width}x{logo_height} logo at ({x}, {y})");
        advance(stage, RenderStage::Watermarked, source);

        // Encoded
        let basename = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ReelcutError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: "source has no usable file name".to_string(),
            })?;
        fs::create_dir_all(&config.output_dir).map_err(as_encode_failure)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let final_name = output_file_name(basename, &timestamp);
        let output = config.output_dir.join(&final_name);

        let frames_per_second = if video_metadata.frames_per_second.is_finite()
            && video_metadata.frames_per_second > 0.0
            && video_metadata.frames_per_second <= 240.0
        {
            video_metadata.frames_per_second
        } else {
            config.video.fallback_frames_per_second
        };

        let mut settings =
            ClipEncoderSettings::new(plan.output_width, plan.output_height, frames_per_second)
                .with_video(config.video.clone());
        if audio.is_some() {
            settings = settings.with_audio(config.audio);
        }

        let partial = PartialOutput::new(&config.output_dir, &final_name);
        let frames = self.encode_window(
            &mut media,
            window,
            &mut reframer,
            &fades,
            &compositor,
            audio.as_ref(),
            &settings,
            &partial,
            container_for(&output),
            &deadline,
        )?;
        partial.commit(&output).map_err(as_encode_failure)?;
        log::info!("Wrote {} ({frames} frames)", output.display());
        advance(stage, RenderStage::Encoded, source);

        // Closed
        drop(compositor);
        drop(reframer);
        drop(media);
        advance(stage, RenderStage::Closed, source);

        let source_deleted = config.delete_source && delete_source(source);

        Ok(RenderedClip {
            source: source.to_path_buf(),
            output,
            window,
            dimensions: (plan.output_width, plan.output_height),
            frames,
            source_deleted,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_window(
        &self,
        media: &mut MediaFile,
        window: Window,
        reframer: &mut Reframer,
        fades: &Fades,
        compositor: &WatermarkCompositor,
        audio: Option<&AudioBuffer>,
        settings: &ClipEncoderSettings,
        partial: &PartialOutput,
        container: &str,
        deadline: &Deadline,
    ) -> Result<u64, ReelcutError> {
        let mut encoder = ClipEncoder::create(partial.path(), container, settings)?;
        let frames_per_second = settings.frames_per_second;
        let expected_frames = (window.length().as_secs_f64() * frames_per_second).ceil() as u64;
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.config.progress),
            OperationType::Rendering,
            Some(expected_frames),
            frames_per_second.round().max(1.0) as u64,
        );

        let start_seconds = window.start.as_secs_f64();
        let mut audio_cursor = 0usize;
        let mut frame_count = 0u64;

        video::for_each_frame(media, window.start, window.end, deadline, |time, frame| {
            let clip_time = (time - start_seconds).max(0.0);
            let mut image = reframer.apply(frame).map_err(as_decode_failure)?;
            fades.apply_to_frame(&mut image, clip_time);
            compositor.overlay(&mut image, clip_time);
            encoder.push_video_frame(&image)?;
            frame_count += 1;

            if let Some(buffer) = audio {
                let played = Duration::from_secs_f64(frame_count as f64 / frames_per_second);
                audio_cursor = push_audio_until(&mut encoder, buffer, audio_cursor, played)?;
            }
            tracker.advance();
            Ok(())
        })
        .map_err(as_decode_failure)?;

        if frame_count == 0 {
            return Err(ReelcutError::DecodeFailure(
                "no video frames decoded in the selected window".to_string(),
            ));
        }

        if let Some(buffer) = audio {
            let clip_length = Duration::from_secs_f64(frame_count as f64 / frames_per_second);
            push_audio_until(&mut encoder, buffer, audio_cursor, clip_length)?;
        }

        deadline.check()?;
        encoder.finish()?;
        tracker.finish();
        Ok(frame_count)
    }
}

/// Push interleaved samples of `buffer` from `cursor` up to playback time
/// `until`; returns the new cursor.
fn push_audio_until(
    encoder: &mut ClipEncoder,
    buffer: &AudioBuffer,
    cursor: usize,
    until: Duration,
) -> Result<usize, ReelcutError> {
    let channels = usize::from(buffer.channels.max(1));
    let frames = (until.as_secs_f64() * f64::from(buffer.sample_rate)).round() as usize;
    let end = (frames * channels).min(buffer.samples.len());
    if end > cursor {
        encoder.push_audio_samples(&buffer.samples[cursor..end])?;
        return Ok(end);
    }
    Ok(cursor)
}

fn advance(stage: &mut RenderStage, next: RenderStage, source: &Path) {
    log::debug!("{}: {} -> {}", source.display(), stage, next);
    *stage = next;
}

/// Remove a rendered source. Failure is logged and reported as `false`.
fn delete_source(source: &Path) -> bool {
    match fs::remove_file(source) {
        Ok(()) => {
            log::info!("Deleted source {}", source.display());
            true
        }
        Err(error) => {
            log::warn!("Could not delete source {}: {error}", source.display());
            false
        }
    }
}

fn as_decode_failure(error: ReelcutError) -> ReelcutError {
    match error {
        ReelcutError::FfmpegError(message) | ReelcutError::DecodeSampleFailure(message) => {
            ReelcutError::DecodeFailure(message)
        }
        ReelcutError::NoAudioStream => {
            ReelcutError::DecodeFailure("audio stream disappeared".to_string())
        }
        other => other,
    }
}

fn as_encode_failure(error: impl Into<ReelcutError>) -> ReelcutError {
    match error.into() {
        ReelcutError::IoError(error) => ReelcutError::EncodeFailure(error.to_string()),
        ReelcutError::FfmpegError(message) => ReelcutError::EncodeFailure(message),
        other => other,
    }
}
