//! Error types for the `reelcut` crate.
//!
//! This module defines [`ReelcutError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry enough context (file
//! paths, stage names, upstream messages) to report a failed render without
//! extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `reelcut` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReelcutError {
    /// The source file could not be opened or probed.
    #[error("Failed to open source video at {path}: {reason}")]
    SourceUnreadable {
        /// Path that was passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source has no video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The source has no audio stream.
    #[error("No audio stream found in file")]
    NoAudioStream,

    /// Audio or frame extraction for a single scoring candidate failed.
    ///
    /// The segment scorer absorbs this error and treats the affected signal
    /// as zero; it never aborts a render.
    #[error("Failed to decode scoring sample: {0}")]
    DecodeSampleFailure(String),

    /// Decoding failed while rendering the selected window.
    #[error("Failed to decode source: {0}")]
    DecodeFailure(String),

    /// The output file could not be encoded or written.
    #[error("Failed to encode output: {0}")]
    EncodeFailure(String),

    /// The watermark logo could not be loaded.
    #[error("Watermark asset missing at {path}: {reason}")]
    AssetMissing {
        /// Configured logo path.
        path: PathBuf,
        /// Why the asset could not be used.
        reason: String,
    },

    /// A time range's start is not before its end.
    #[error("Invalid range: start ({start:?}) must be less than end ({end:?})")]
    InvalidRange {
        /// The start of the range.
        start: Duration,
        /// The end of the range.
        end: Duration,
    },

    /// The per-file deadline expired.
    #[error("Render exceeded its time limit of {0:?}")]
    Timeout(Duration),

    /// The batch input directory does not exist.
    #[error("Input directory not found: {0}")]
    InputDirectoryMissing(PathBuf),

    /// Handing a rendered file to the publisher failed.
    #[error("Failed to publish {path}: {reason}")]
    PublishFailure {
        /// The rendered file that was being published.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ReelcutError {
    fn from(error: FfmpegError) -> Self {
        ReelcutError::FfmpegError(error.to_string())
    }
}

impl ReelcutError {
    /// Returns `true` for errors that must abort scoring instead of being
    /// absorbed as a zero signal.
    pub(crate) fn is_fatal_for_scoring(&self) -> bool {
        matches!(self, ReelcutError::Timeout(_))
    }
}
