//! Directory batch driver.
//!
//! [`BatchRunner`] renders every video in a directory, one at a time, in
//! sorted name order. A failed file is recorded and the batch moves on.
//! Each rendered clip is offered to the configured [`Publisher`] once.
//!
//! # Example
//!
//! ```no_run
//! use reelcut::{BatchRunner, DirectoryPublisher, RenderConfig, RenderPipeline, ReelcutError};
//!
//! let pipeline = RenderPipeline::new(RenderConfig::new("videos_editados", "logo.png"));
//! let report = BatchRunner::new(pipeline)
//!     .with_publisher(Box::new(DirectoryPublisher::new("outbox")))
//!     .run("videos_descargados")?;
//! println!("{} rendered, {} failed", report.rendered(), report.failed());
//! # Ok::<(), ReelcutError>(())
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::ReelcutError,
    pipeline::{RenderOutcome, RenderPipeline},
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
    publish::Publisher,
};

/// File extensions the batch driver picks up (compared case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// Result of offering one clip to the publisher.
#[derive(Debug)]
pub struct PublishRecord {
    /// The rendered file.
    pub output: PathBuf,
    /// Identifier returned by the publisher, or the failure.
    pub result: Result<String, ReelcutError>,
}

/// Everything that happened during one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One outcome per candidate file, in processing order.
    pub outcomes: Vec<RenderOutcome>,
    /// One record per publish attempt.
    pub published: Vec<PublishRecord>,
}

impl BatchReport {
    /// Number of rendered files.
    pub fn rendered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_rendered()).count()
    }

    /// Number of failed files.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.rendered()
    }

    /// Number of failed publish attempts.
    pub fn publish_failures(&self) -> usize {
        self.published.iter().filter(|p| p.result.is_err()).count()
    }
}

/// `true` when `path` has one of [`VIDEO_EXTENSIONS`].
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

/// Video files directly inside `directory`, sorted by path.
///
/// # Errors
///
/// [`ReelcutError::InputDirectoryMissing`] if `directory` is not a
/// directory.
pub fn collect_inputs(directory: &Path) -> Result<Vec<PathBuf>, ReelcutError> {
    if !directory.is_dir() {
        return Err(ReelcutError::InputDirectoryMissing(directory.to_path_buf()));
    }
    let mut inputs = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && is_video_file(&path) {
            inputs.push(path);
        } else {
            log::debug!("Skipping {}", path.display());
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Sequential driver over a directory of sources.
pub struct BatchRunner {
    pipeline: RenderPipeline,
    publisher: Option<Box<dyn Publisher>>,
    progress: Arc<dyn ProgressCallback>,
}

impl BatchRunner {
    /// Drive `pipeline` without publishing.
    pub fn new(pipeline: RenderPipeline) -> Self {
        Self {
            pipeline,
            publisher: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Offer each rendered clip to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Report one step per processed file.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The pipeline in use.
    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Render every video in `input_dir`.
    ///
    /// # Errors
    ///
    /// Only directory-level problems are returned; per-file failures are
    /// recorded in the report.
    pub fn run<P: AsRef<Path>>(&self, input_dir: P) -> Result<BatchReport, ReelcutError> {
        let inputs = collect_inputs(input_dir.as_ref())?;
        log::info!(
            "Processing {} videos from {}",
            inputs.len(),
            input_dir.as_ref().display()
        );

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::Batch,
            Some(inputs.len() as u64),
            1,
        );
        let mut report = BatchReport::default();

        for input in inputs {
            let outcome = self.pipeline.process(&input);
            if let (Some(publisher), Some(output)) = (&self.publisher, outcome.output()) {
                let result = publisher.publish(output);
                if let Err(error) = &result {
                    log::warn!("Publishing {} failed: {error}", output.display());
                }
                report.published.push(PublishRecord {
                    output: output.to_path_buf(),
                    result,
                });
            }
            report.outcomes.push(outcome);
            tracker.advance();
        }

        log::info!(
            "Batch finished: {} rendered, {} failed",
            report.rendered(),
            report.failed()
        );
        Ok(report)
    }
}
