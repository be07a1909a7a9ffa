//! Progress reporting and the per-file deadline.
//!
//! This module provides [`ProgressCallback`] for observing long-running
//! work, [`ProgressInfo`] snapshots, and [`Deadline`], the cooperative time
//! limit checked inside every decode and encode loop so a malformed input
//! cannot hang a batch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reelcut::{ProgressCallback, ProgressInfo, RenderConfig};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let config = RenderConfig::new("out", "logo.png").with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::Arc;
#[cfg(feature = "rayon")]
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::ReelcutError;

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Measuring candidate windows.
    Scoring,
    /// Encoding frames of the output clip.
    Rendering,
    /// Walking the files of a batch.
    Batch,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items (frames, candidates, files) are done.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates.
///
/// Callbacks are infallible: they observe but cannot halt the operation.
/// Implementations must be [`Send`] and [`Sync`] because the parallel scorer
/// may report from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative time limit for one file.
///
/// Created when a render starts; decode and encode loops call
/// [`check`](Deadline::check) before each unit of work and bail out with
/// [`ReelcutError::Timeout`] once it has passed.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use reelcut::Deadline;
///
/// let deadline = Deadline::after(Some(Duration::from_secs(60)));
/// assert!(deadline.check().is_ok());
///
/// assert!(Deadline::unbounded().check().is_ok());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now, or an unbounded one for `None`.
    pub fn after(limit: Option<Duration>) -> Self {
        match limit {
            Some(limit) => Self {
                expires_at: Instant::now().checked_add(limit),
                limit,
            },
            None => Self::unbounded(),
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self {
            expires_at: None,
            limit: Duration::MAX,
        }
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Fail with [`ReelcutError::Timeout`] if the deadline has passed.
    pub fn check(&self) -> Result<(), ReelcutError> {
        if self.is_expired() {
            return Err(ReelcutError::Timeout(self.limit));
        }
        Ok(())
    }
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    /// Create a new tracker that reports every `batch_size` items.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one completed item and fire the callback if the batch
    /// threshold is reached.
    pub(crate) fn advance(&mut self) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report();
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
        };

        self.callback.on_progress(&info);
    }
}

/// Progress counter shared by parallel workers.
///
/// Every [`advance`](SharedProgress::advance) reports immediately, so
/// `current` reaches the callback from whichever thread finished the item.
#[cfg(feature = "rayon")]
pub(crate) struct SharedProgress {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: AtomicU64,
    start_time: Instant,
}

#[cfg(feature = "rayon")]
impl SharedProgress {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one completed item and report it.
    pub(crate) fn advance(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (current as f32 / t as f32) * 100.0);

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u64>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.seen.lock().unwrap().push(info.current);
        }
    }

    #[test]
    fn tracker_reports_every_batch() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::Rendering, Some(5), 2);
        for _ in 0..5 {
            tracker.advance();
        }
        tracker.finish();
        assert_eq!(*recorder.seen.lock().unwrap(), vec![2, 4, 5]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn shared_progress_counts_across_threads() {
        let recorder = Arc::new(Recorder::default());
        let shared = SharedProgress::new(recorder.clone(), OperationType::Scoring, Some(8));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    shared.advance();
                    shared.advance();
                });
            }
        });
        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (1..=8).collect::<Vec<u64>>());
    }

    #[test]
    fn zero_deadline_expires() {
        let deadline = Deadline::after(Some(Duration::ZERO));
        assert!(deadline.is_expired());
        assert!(matches!(deadline.check(), Err(ReelcutError::Timeout(_))));
    }

    #[test]
    fn unbounded_deadline_never_expires() {
        let deadline = Deadline::after(None);
        assert!(!deadline.is_expired());
        assert!(deadline.check().is_ok());
    }
}
