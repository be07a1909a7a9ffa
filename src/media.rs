//! Core [`MediaFile`] implementation.
//!
//! `MediaFile` is the source handle for one render. It opens the file,
//! reads and caches metadata for the best video and audio streams, and is
//! then borrowed by the decoding helpers in [`crate::audio`] and
//! [`crate::video`]. Dropping it closes the demuxer.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input, media::Type};

use crate::{
    error::ReelcutError,
    metadata::{AudioMetadata, MediaMetadata, VideoMetadata},
};

/// An opened, decodable source video.
///
/// Created via [`MediaFile::open`]. Owned exclusively by the pipeline
/// invocation that opened it.
///
/// # Example
///
/// ```no_run
/// use reelcut::{MediaFile, ReelcutError};
///
/// let source = MediaFile::open("input.mp4")?;
/// let video = source.metadata().video.as_ref().unwrap();
/// println!("{}x{} for {:?}", video.width, video.height, source.metadata().duration);
/// # Ok::<(), ReelcutError>(())
/// ```
pub struct MediaFile {
    /// The opened FFmpeg input (demuxer) context.
    pub(crate) input_context: Input,
    /// Cached metadata extracted at open time.
    pub(crate) metadata: MediaMetadata,
    /// Index of the best video stream, if one exists.
    pub(crate) video_stream_index: Option<usize>,
    /// Index of the best audio stream, if one exists.
    pub(crate) audio_stream_index: Option<usize>,
    /// Path to the opened media file.
    pub(crate) file_path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("audio_stream_index", &self.audio_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a source file.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video and audio streams, and caches their metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ReelcutError::SourceUnreadable`] if the file cannot be
    /// opened or its stream parameters cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReelcutError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening source video: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| ReelcutError::SourceUnreadable {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| ReelcutError::SourceUnreadable {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let format = input_context.format().name().to_string();

        let mut video_stream_index = None;
        let mut video = None;
        if let Some(stream) = input_context.streams().best(Type::Video) {
            let index = stream.index();
            let decoder_context =
                CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                    ReelcutError::SourceUnreadable {
                        path: file_path.clone(),
                        reason: format!(
                            "Failed to read video codec parameters for stream {index}: {error}"
                        ),
                    }
                })?;
            let video_decoder =
                decoder_context
                    .decoder()
                    .video()
                    .map_err(|error| ReelcutError::SourceUnreadable {
                        path: file_path.clone(),
                        reason: format!(
                            "Failed to create video decoder for stream {index}: {error}"
                        ),
                    })?;

            let frame_rate = stream.avg_frame_rate();
            let frames_per_second = if frame_rate.denominator() != 0 {
                frame_rate.numerator() as f64 / frame_rate.denominator() as f64
            } else {
                let rate = stream.rate();
                if rate.denominator() != 0 {
                    rate.numerator() as f64 / rate.denominator() as f64
                } else {
                    0.0
                }
            };

            let codec = video_decoder
                .codec()
                .map(|codec| codec.name().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            video_stream_index = Some(index);
            video = Some(VideoMetadata {
                width: video_decoder.width(),
                height: video_decoder.height(),
                frames_per_second,
                codec,
            });
        }

        let mut audio_stream_index = None;
        let mut audio = None;
        if let Some(stream) = input_context.streams().best(Type::Audio) {
            let index = stream.index();
            // A broken audio stream degrades to "no audio" rather than
            // rejecting a perfectly watchable video.
            let audio_decoder = CodecContext::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().audio());
            match audio_decoder {
                Ok(audio_decoder) => {
                    let codec = audio_decoder
                        .codec()
                        .map(|codec| codec.name().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    audio_stream_index = Some(index);
                    audio = Some(AudioMetadata {
                        sample_rate: audio_decoder.rate(),
                        channels: audio_decoder.channels(),
                        codec,
                    });
                }
                Err(error) => {
                    log::warn!(
                        "Ignoring unreadable audio stream {index} in {}: {error}",
                        file_path.display()
                    );
                }
            }
        }

        let metadata = MediaMetadata {
            video,
            audio,
            duration,
            format,
        };

        log::info!(
            "Opened source video: {} (format={}, duration={:.2}s, audio={})",
            file_path.display(),
            metadata.format,
            metadata.duration.as_secs_f64(),
            metadata.audio.is_some(),
        );

        if let Some(video) = &metadata.video {
            log::debug!(
                "Best video stream: {}x{}, {:.2} fps, codec={}",
                video.width,
                video.height,
                video.frames_per_second,
                video.codec,
            );
        }

        Ok(Self {
            input_context,
            metadata,
            video_stream_index,
            audio_stream_index,
            file_path,
        })
    }

    /// Get a reference to the cached metadata.
    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Whether the source carries a usable audio track.
    pub fn has_audio(&self) -> bool {
        self.audio_stream_index.is_some()
    }

    /// Metadata of the video stream, or [`ReelcutError::NoVideoStream`].
    pub fn video_metadata(&self) -> Result<&VideoMetadata, ReelcutError> {
        self.metadata
            .video
            .as_ref()
            .ok_or(ReelcutError::NoVideoStream)
    }
}
