//! Hand-off of rendered clips.
//!
//! A [`Publisher`] receives each finished file exactly once and returns an
//! identifier for it. Implementations are passed to
//! [`BatchRunner::with_publisher`](crate::BatchRunner::with_publisher)
//! explicitly; there is no global session.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ReelcutError;

/// Receives rendered clips.
pub trait Publisher {
    /// Publish the file at `path` and return an identifier for it.
    ///
    /// Called once per file; failures are recorded by the caller and never
    /// retried.
    fn publish(&self, path: &Path) -> Result<String, ReelcutError>;
}

/// Publishes by copying into a local directory.
///
/// The identifier returned is the destination path.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    destination: PathBuf,
}

impl DirectoryPublisher {
    /// Copy published files into `destination`, creating it on first use.
    pub fn new<P: AsRef<Path>>(destination: P) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
        }
    }

    /// The target directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl Publisher for DirectoryPublisher {
    fn publish(&self, path: &Path) -> Result<String, ReelcutError> {
        let failure = |reason: String| ReelcutError::PublishFailure {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| failure("path has no file name".to_string()))?;
        fs::create_dir_all(&self.destination).map_err(|error| failure(error.to_string()))?;

        let target = self.destination.join(file_name);
        fs::copy(path, &target).map_err(|error| failure(error.to_string()))?;
        log::info!("Published {} to {}", path.display(), target.display());
        Ok(target.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_into_destination() {
        let source_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let clip = source_dir.path().join("edit_clip.mp4");
        fs::write(&clip, b"clip").unwrap();

        let publisher = DirectoryPublisher::new(target_dir.path().join("nested"));
        let identifier = publisher.publish(&clip).unwrap();

        let copied = target_dir.path().join("nested").join("edit_clip.mp4");
        assert_eq!(identifier, copied.display().to_string());
        assert_eq!(fs::read(copied).unwrap(), b"clip");
        assert!(clip.exists());
    }

    #[test]
    fn missing_file_is_a_publish_failure() {
        let target_dir = tempfile::tempdir().unwrap();
        let publisher = DirectoryPublisher::new(target_dir.path());
        let result = publisher.publish(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(ReelcutError::PublishFailure { .. })));
    }
}
