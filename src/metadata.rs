//! Source metadata types.
//!
//! This module defines the metadata returned by
//! [`MediaFile::metadata`](crate::MediaFile::metadata). Metadata is read once
//! when the file is opened and cached for the lifetime of the handle.

use std::time::Duration;

/// Container-level metadata for a source video.
///
/// # Example
///
/// ```no_run
/// use reelcut::MediaFile;
///
/// let source = MediaFile::open("input.mp4").unwrap();
/// let metadata = source.metadata();
/// println!("Duration: {:?}", metadata.duration);
/// println!("Has audio: {}", metadata.audio.is_some());
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaMetadata {
    /// Video stream metadata, if a video stream is present.
    pub video: Option<VideoMetadata>,
    /// Audio stream metadata, if an audio stream is present.
    pub audio: Option<AudioMetadata>,
    /// Total duration of the media file.
    pub duration: Duration,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"avi"`).
    pub format: String,
}

impl MediaMetadata {
    /// Duration in fractional seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Metadata for the best video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Metadata for the best audio stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct AudioMetadata {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of audio channels.
    pub channels: u16,
    /// Codec name (e.g. `"aac"`, `"mp3"`).
    pub codec: String,
}
