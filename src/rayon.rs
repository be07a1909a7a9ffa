//! Parallel candidate scoring.
//!
//! This module provides [`score_windows_parallel`] which spreads candidate
//! windows across [`rayon`] worker threads. Each worker opens its own demuxer
//! and decoders so there is no shared mutable state.
//!
//! The public entry point is
//! [`SegmentScorer::score_candidates`](crate::SegmentScorer::score_candidates)
//! with [`ScoringMode::PerWindow`](crate::ScoringMode::PerWindow); this module
//! contains only the internal implementation.

use std::path::Path;

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::ScoringConfig;
use crate::error::ReelcutError;
use crate::media::MediaFile;
use crate::progress::{Deadline, SharedProgress};
use crate::scoring::{CandidateScore, Window, WindowDecoder, sample_failure, score_window};

/// Score `windows` in parallel.
///
/// Results are returned in the order of `windows` regardless of which worker
/// finished first, so selection over them stays deterministic. `progress`
/// advances as each worker finishes a window.
pub(crate) fn score_windows_parallel(
    file_path: &Path,
    windows: &[Window],
    config: &ScoringConfig,
    deadline: &Deadline,
    progress: &SharedProgress,
) -> Result<Vec<CandidateScore>, ReelcutError> {
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    log::debug!(
        "Scoring {} windows of {} across rayon workers",
        windows.len(),
        file_path.display()
    );

    windows
        .par_iter()
        .map(|&window| {
            deadline.check()?;
            let score = score_in_worker(file_path, window, config, *deadline)?;
            progress.advance();
            Ok(score)
        })
        .collect()
}

/// Measure one window from a fresh file context.
fn score_in_worker(
    file_path: &Path,
    window: Window,
    config: &ScoringConfig,
    deadline: Deadline,
) -> Result<CandidateScore, ReelcutError> {
    let mut media = match MediaFile::open(file_path) {
        Ok(media) => media,
        Err(error) => {
            log::debug!(
                "Worker could not reopen {}: {}",
                file_path.display(),
                sample_failure(error)
            );
            return Ok(CandidateScore {
                window,
                audio_energy: 0.0,
                motion_energy: 0.0,
                score: 0.0,
            });
        }
    };
    let mut probe = WindowDecoder::new(&mut media, config.audio_sample_rate, deadline);
    score_window(&mut probe, window, config)
}
