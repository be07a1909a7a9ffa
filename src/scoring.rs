//! Highlight selection.
//!
//! [`SegmentScorer`] slides a fixed-length window across the source in
//! `stride` steps and keeps the window with the highest weighted sum of audio
//! energy (mean absolute amplitude) and motion energy (summed absolute RGB
//! difference between frames sampled once per second).
//!
//! Signals are measured through an [`EnergyProbe`]. Two probes ship:
//!
//! - [`SignalProfile`] decodes the source once, bucketing both signals per
//!   second, and answers every window from the buckets.
//! - [`WindowDecoder`] decodes each candidate window separately. With the
//!   `rayon` feature the candidates are spread over worker threads.
//!
//! A failed measurement never fails the render: the affected signal counts
//! as zero for that candidate. Only an expired deadline aborts scoring.
//!
//! # Example
//!
//! ```no_run
//! use reelcut::{Deadline, MediaFile, ReelcutError, ScoringConfig, SegmentScorer};
//!
//! let mut source = MediaFile::open("long_video.mp4")?;
//! let scorer = SegmentScorer::new(ScoringConfig::default());
//! let window = scorer.best_window(&mut source, &Deadline::unbounded())?;
//! println!("best window starts at {:?}", window.start);
//! # Ok::<(), ReelcutError>(())
//! ```

use std::{sync::Arc, time::Duration};

use image::RgbImage;

use crate::{
    audio,
    config::{ScoringConfig, ScoringMode},
    error::ReelcutError,
    media::MediaFile,
    progress::{Deadline, NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
    video,
};

#[cfg(feature = "rayon")]
use crate::progress::SharedProgress;

/// A candidate sub-interval of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Offset of the first included instant.
    pub start: Duration,
    /// Offset just past the last included instant.
    pub end: Duration,
}

impl Window {
    /// A window of `length` starting at `start`.
    pub fn new(start: Duration, length: Duration) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// `end - start`.
    pub fn length(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Measured signals of one candidate window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    /// The measured window.
    pub window: Window,
    /// Mean absolute amplitude, 0 when unavailable.
    pub audio_energy: f64,
    /// Summed inter-frame difference, 0 when unavailable.
    pub motion_energy: f64,
    /// Weighted combination of both energies.
    pub score: f64,
}

/// Measures the two scoring signals of a window.
///
/// Implementations return `Err` when a signal cannot be measured; the scorer
/// decides how to treat the failure.
pub trait EnergyProbe {
    /// Mean absolute audio amplitude across the window.
    fn audio_energy(&mut self, window: Window) -> Result<f64, ReelcutError>;

    /// Sum of absolute differences between consecutive sampled frames.
    fn motion_energy(&mut self, window: Window) -> Result<f64, ReelcutError>;
}

/// Every candidate window of `target` length in a source of `duration`,
/// starting at `0, stride, 2·stride, …` and ending no later than `duration`.
pub fn candidate_windows(duration: Duration, target: Duration, stride: Duration) -> Vec<Window> {
    let mut windows = Vec::new();
    if stride.is_zero() || target > duration {
        return windows;
    }
    let mut start = Duration::ZERO;
    while start + target <= duration {
        windows.push(Window::new(start, target));
        start += stride;
    }
    windows
}

/// Sum over all pixels and channels of `|a - b|`.
///
/// Frames of different size are compared over their common top-left area.
pub fn frame_difference(previous: &RgbImage, current: &RgbImage) -> u64 {
    if previous.dimensions() == current.dimensions() {
        return previous
            .as_raw()
            .iter()
            .zip(current.as_raw())
            .map(|(&a, &b)| u64::from(a.abs_diff(b)))
            .sum();
    }

    let width = previous.width().min(current.width());
    let height = previous.height().min(current.height());
    let mut total = 0u64;
    for y in 0..height {
        for x in 0..width {
            let a = previous.get_pixel(x, y);
            let b = current.get_pixel(x, y);
            total += a
                .0
                .iter()
                .zip(b.0.iter())
                .map(|(&a, &b)| u64::from(a.abs_diff(b)))
                .sum::<u64>();
        }
    }
    total
}

/// Measure one candidate, absorbing non-fatal signal failures as zero.
pub fn score_window<P: EnergyProbe + ?Sized>(
    probe: &mut P,
    window: Window,
    config: &ScoringConfig,
) -> Result<CandidateScore, ReelcutError> {
    let audio_energy = absorb("audio", window, probe.audio_energy(window))?;
    let motion_energy = absorb("motion", window, probe.motion_energy(window))?;
    Ok(CandidateScore {
        window,
        audio_energy,
        motion_energy,
        score: config.audio_weight * audio_energy + config.motion_weight * motion_energy,
    })
}

fn absorb(
    signal: &str,
    window: Window,
    measured: Result<f64, ReelcutError>,
) -> Result<f64, ReelcutError> {
    match measured {
        Ok(value) => Ok(value),
        Err(error) if error.is_fatal_for_scoring() => Err(error),
        Err(error) => {
            log::debug!(
                "Treating {signal} energy of window {:.0}s..{:.0}s as zero: {error}",
                window.start.as_secs_f64(),
                window.end.as_secs_f64(),
            );
            Ok(0.0)
        }
    }
}

/// Pick the highest-scoring candidate.
///
/// Candidates are visited in the given order and only a strictly greater
/// score replaces the current best, so the earliest candidate wins ties.
/// When nothing beats zero the window `(0, target)` is returned.
pub fn select_best_window(candidates: &[CandidateScore], target: Duration) -> Window {
    let (best, _) = candidates.iter().fold(
        (Window::new(Duration::ZERO, target), 0.0f64),
        |(best, best_score), candidate| {
            if candidate.score > best_score {
                (candidate.window, candidate.score)
            } else {
                (best, best_score)
            }
        },
    );
    best
}

/// Converts any non-fatal error into [`ReelcutError::DecodeSampleFailure`].
pub(crate) fn sample_failure(error: ReelcutError) -> ReelcutError {
    if error.is_fatal_for_scoring() {
        error
    } else {
        ReelcutError::DecodeSampleFailure(error.to_string())
    }
}

/// A decode failure part-way through a profile pass.
///
/// Buckets before `at` seconds are complete; windows ending after it report
/// the failure.
#[derive(Debug, Clone, PartialEq)]
struct SignalFailure {
    at: f64,
    reason: String,
}

impl SignalFailure {
    fn check(failure: Option<&Self>, window: Window) -> Result<(), ReelcutError> {
        match failure {
            Some(failure) if window.end.as_secs_f64() > failure.at => {
                Err(ReelcutError::DecodeSampleFailure(failure.reason.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Per-second signal buckets of a whole source, measured in one pass.
///
/// Audio is accumulated as absolute-sample sums and sample counts per
/// second; motion as the difference between the frame sampled at second `k`
/// and the one at `k - 1`. Windows are answered at whole-second resolution.
#[derive(Debug, Clone, Default)]
pub struct SignalProfile {
    audio_sums: Vec<f64>,
    audio_counts: Vec<u64>,
    audio_failure: Option<SignalFailure>,
    /// `motion[k]` is the difference between samples `k - 1` and `k`;
    /// `motion[0]` is always zero.
    motion: Vec<f64>,
    motion_failure: Option<SignalFailure>,
}

impl SignalProfile {
    /// Decode `media` once and bucket both signals.
    ///
    /// A decode failure stops that signal's pass; buckets measured before it
    /// are kept and only windows reaching past the failure report
    /// [`ReelcutError::DecodeSampleFailure`]. Only a deadline expiry is
    /// returned as an error.
    pub fn measure(
        media: &mut MediaFile,
        config: &ScoringConfig,
        deadline: &Deadline,
    ) -> Result<Self, ReelcutError> {
        let duration = media.metadata().duration;
        let mut profile = Self::default();

        if duration.is_zero() {
            return Ok(profile);
        }

        let mut audio_reached = 0.0;
        if let Err(error) =
            profile.measure_audio(media, duration, config, deadline, &mut audio_reached)
        {
            if error.is_fatal_for_scoring() {
                return Err(error);
            }
            log::debug!(
                "Audio profile of {} stops at {audio_reached:.2}s: {error}",
                media.path().display()
            );
            profile.audio_failure = Some(SignalFailure {
                at: audio_reached,
                reason: error.to_string(),
            });
        }

        if let Err(error) = profile.measure_motion(media, duration, deadline) {
            if error.is_fatal_for_scoring() {
                return Err(error);
            }
            // Sample k is taken at second k, so every sample before the
            // failure is complete.
            let motion_reached = profile.motion.len() as f64;
            log::warn!(
                "Motion profile of {} stops at {motion_reached:.0}s: {error}",
                media.path().display()
            );
            profile.motion_failure = Some(SignalFailure {
                at: motion_reached,
                reason: error.to_string(),
            });
        }

        log::debug!(
            "Measured signal profile: {} audio buckets, {} motion samples",
            profile.audio_sums.len(),
            profile.motion.len()
        );
        Ok(profile)
    }

    /// Build a profile from precomputed buckets.
    ///
    /// `audio` holds `(sum of |sample|, sample count)` per second and
    /// `motion[k]` the difference between the samples at seconds `k - 1`
    /// and `k`.
    pub fn from_buckets(audio: Vec<(f64, u64)>, motion: Vec<f64>) -> Self {
        let (audio_sums, audio_counts) = audio.into_iter().unzip();
        Self {
            audio_sums,
            audio_counts,
            audio_failure: None,
            motion,
            motion_failure: None,
        }
    }

    fn measure_audio(
        &mut self,
        media: &mut MediaFile,
        duration: Duration,
        config: &ScoringConfig,
        deadline: &Deadline,
        reached: &mut f64,
    ) -> Result<(), ReelcutError> {
        let channels = media
            .metadata()
            .audio
            .as_ref()
            .map(|audio| audio.channels.max(1))
            .ok_or(ReelcutError::NoAudioStream)?;
        let rate = config.audio_sample_rate;
        let buckets = duration.as_secs_f64().ceil() as usize;
        self.audio_sums = vec![0.0; buckets];
        self.audio_counts = vec![0; buckets];

        let (sums, counts) = (&mut self.audio_sums, &mut self.audio_counts);
        audio::for_each_audio_chunk(
            media,
            Duration::ZERO,
            duration,
            rate,
            channels,
            deadline,
            |chunk_time, samples| {
                let channels = usize::from(channels);
                for (frame_index, frame) in samples.chunks(channels).enumerate() {
                    let time = chunk_time + frame_index as f64 / f64::from(rate);
                    let bucket = (time.max(0.0) as usize).min(buckets.saturating_sub(1));
                    sums[bucket] += frame.iter().map(|s| f64::from(s.abs())).sum::<f64>();
                    counts[bucket] += frame.len() as u64;
                }
                let frames = samples.len() / channels;
                *reached = chunk_time + frames as f64 / f64::from(rate);
                Ok(())
            },
        )
    }

    fn measure_motion(
        &mut self,
        media: &mut MediaFile,
        duration: Duration,
        deadline: &Deadline,
    ) -> Result<(), ReelcutError> {
        let motion = &mut self.motion;
        let mut previous: Option<RgbImage> = None;
        video::sample_frames(
            media,
            Duration::ZERO,
            duration,
            Duration::from_secs(1),
            deadline,
            |_, image| {
                let difference = previous
                    .as_ref()
                    .map_or(0, |previous| frame_difference(previous, image));
                motion.push(difference as f64);
                previous = Some(image.clone());
                Ok(())
            },
        )
    }

    fn bucket_range(window: Window) -> (usize, usize) {
        (
            window.start.as_secs_f64().floor() as usize,
            window.end.as_secs_f64().ceil() as usize,
        )
    }
}

impl EnergyProbe for SignalProfile {
    fn audio_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
        SignalFailure::check(self.audio_failure.as_ref(), window)?;
        let (start, end) = Self::bucket_range(window);
        let end = end.min(self.audio_sums.len());
        if start >= end {
            return Ok(0.0);
        }
        let sum: f64 = self.audio_sums[start..end].iter().sum();
        let count: u64 = self.audio_counts[start..end].iter().sum();
        Ok(if count == 0 { 0.0 } else { sum / count as f64 })
    }

    fn motion_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
        SignalFailure::check(self.motion_failure.as_ref(), window)?;
        // Samples start..end belong to the window; pairs are (k-1, k) for
        // k in start+1..end.
        let (start, end) = Self::bucket_range(window);
        let end = end.min(self.motion.len());
        if start + 1 >= end {
            return Ok(0.0);
        }
        Ok(self.motion[start + 1..end].iter().sum())
    }
}

/// Probe that decodes every requested window from the source.
pub struct WindowDecoder<'a> {
    media: &'a mut MediaFile,
    sample_rate: u32,
    deadline: Deadline,
}

impl<'a> WindowDecoder<'a> {
    /// Probe `media`, decoding audio at `sample_rate`.
    pub fn new(media: &'a mut MediaFile, sample_rate: u32, deadline: Deadline) -> Self {
        Self {
            media,
            sample_rate,
            deadline,
        }
    }
}

impl EnergyProbe for WindowDecoder<'_> {
    fn audio_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
        let channels = self
            .media
            .metadata()
            .audio
            .as_ref()
            .map(|audio| audio.channels.max(1))
            .ok_or(ReelcutError::NoAudioStream)
            .map_err(sample_failure)?;
        let buffer = audio::decode_range(
            self.media,
            window.start,
            window.end,
            self.sample_rate,
            channels,
            &self.deadline,
        )
        .map_err(sample_failure)?;
        Ok(buffer.mean_abs())
    }

    fn motion_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
        let mut previous: Option<RgbImage> = None;
        let mut total = 0u64;
        video::sample_frames(
            self.media,
            window.start,
            window.end,
            Duration::from_secs(1),
            &self.deadline,
            |_, image| {
                if let Some(previous) = &previous {
                    total += frame_difference(previous, image);
                }
                previous = Some(image.clone());
                Ok(())
            },
        )
        .map_err(sample_failure)?;
        Ok(total as f64)
    }
}

/// Finds the most engaging window of a source.
pub struct SegmentScorer {
    config: ScoringConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl SegmentScorer {
    /// Create a scorer with the given settings.
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Report one progress step per measured candidate.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The scorer's settings.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Measure every candidate window of `media`, in start order.
    ///
    /// Returns an empty list when the source is not longer than the target
    /// duration.
    pub fn score_candidates(
        &self,
        media: &mut MediaFile,
        deadline: &Deadline,
    ) -> Result<Vec<CandidateScore>, ReelcutError> {
        let duration = media.metadata().duration;
        let windows =
            candidate_windows(duration, self.config.target_duration, self.config.stride);
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        log::debug!(
            "Scoring {} candidate windows of {:?} ({:?})",
            windows.len(),
            self.config.target_duration,
            self.config.mode,
        );

        match self.config.mode {
            ScoringMode::SinglePass => {
                let mut profile = SignalProfile::measure(media, &self.config, deadline)?;
                self.score_with(&mut profile, &windows, deadline)
            }
            #[cfg(feature = "rayon")]
            ScoringMode::PerWindow => {
                let progress = SharedProgress::new(
                    Arc::clone(&self.progress),
                    OperationType::Scoring,
                    Some(windows.len() as u64),
                );
                crate::rayon::score_windows_parallel(
                    media.path(),
                    &windows,
                    &self.config,
                    deadline,
                    &progress,
                )
            }
            #[cfg(not(feature = "rayon"))]
            ScoringMode::PerWindow => {
                let mut probe =
                    WindowDecoder::new(media, self.config.audio_sample_rate, *deadline);
                self.score_with(&mut probe, &windows, deadline)
            }
        }
    }

    /// Measure `windows` with `probe`, in order.
    pub fn score_with<P: EnergyProbe + ?Sized>(
        &self,
        probe: &mut P,
        windows: &[Window],
        deadline: &Deadline,
    ) -> Result<Vec<CandidateScore>, ReelcutError> {
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::Scoring,
            Some(windows.len() as u64),
            1,
        );
        let mut scores = Vec::with_capacity(windows.len());
        for &window in windows {
            deadline.check()?;
            scores.push(score_window(probe, window, &self.config)?);
            tracker.advance();
        }
        Ok(scores)
    }

    /// The best window of `media`, or the whole source when it is not longer
    /// than the target duration.
    pub fn best_window(
        &self,
        media: &mut MediaFile,
        deadline: &Deadline,
    ) -> Result<Window, ReelcutError> {
        let duration = media.metadata().duration;
        if duration <= self.config.target_duration {
            return Ok(Window {
                start: Duration::ZERO,
                end: duration,
            });
        }

        let scores = self.score_candidates(media, deadline)?;
        let best = select_best_window(&scores, self.config.target_duration);
        if let Some(winner) = scores.iter().find(|candidate| candidate.window == best) {
            log::info!(
                "Selected window {:.0}s..{:.0}s of {} (score={:.3}, audio={:.4}, motion={:.0})",
                best.start.as_secs_f64(),
                best.end.as_secs_f64(),
                media.path().display(),
                winner.score,
                winner.audio_energy,
                winner.motion_energy,
            );
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use image::Rgb;

    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    /// Probe answering from fixed tables keyed by window start second.
    struct TableProbe {
        audio: HashMap<u64, Result<f64, ()>>,
        motion: HashMap<u64, f64>,
    }

    impl EnergyProbe for TableProbe {
        fn audio_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
            match self.audio.get(&window.start.as_secs()) {
                Some(Ok(value)) => Ok(*value),
                Some(Err(())) => Err(ReelcutError::DecodeSampleFailure("broken".into())),
                None => Ok(0.0),
            }
        }

        fn motion_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
            Ok(self.motion.get(&window.start.as_secs()).copied().unwrap_or(0.0))
        }
    }

    fn scorer() -> SegmentScorer {
        SegmentScorer::new(ScoringConfig::default())
    }

    #[test]
    fn candidates_cover_ninety_seconds() {
        let windows = candidate_windows(secs(90), secs(60), secs(5));
        let starts: Vec<u64> = windows.iter().map(|w| w.start.as_secs()).collect();
        assert_eq!(starts, vec![0, 5, 10, 15, 20, 25, 30]);
        assert!(windows.iter().all(|w| w.length() == secs(60)));
        assert!(windows.iter().all(|w| w.end <= secs(90)));
    }

    #[test]
    fn candidates_for_a_source_just_over_target() {
        let windows = candidate_windows(Duration::from_millis(60_500), secs(60), secs(5));
        assert_eq!(windows, vec![Window::new(Duration::ZERO, secs(60))]);
    }

    #[test]
    fn no_candidates_for_short_sources() {
        assert!(candidate_windows(secs(45), secs(60), secs(5)).is_empty());
    }

    #[test]
    fn score_combines_weights() {
        let mut probe = TableProbe {
            audio: HashMap::from([(0, Ok(0.5))]),
            motion: HashMap::from([(0, 10.0)]),
        };
        let scored = score_window(&mut probe, Window::new(secs(0), secs(60)), &ScoringConfig::default())
            .unwrap();
        assert!((scored.score - (0.6 * 0.5 + 0.4 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn motion_peak_selects_its_window() {
        let windows = candidate_windows(secs(90), secs(60), secs(5));
        let mut probe = TableProbe {
            audio: HashMap::new(),
            motion: HashMap::from([(20, 1000.0)]),
        };
        let scores = scorer()
            .score_with(&mut probe, &windows, &Deadline::unbounded())
            .unwrap();
        let best = select_best_window(&scores, secs(60));
        assert_eq!(best, Window::new(secs(20), secs(60)));
    }

    #[test]
    fn audio_failure_counts_as_zero() {
        let windows = candidate_windows(secs(90), secs(60), secs(5));
        let mut probe = TableProbe {
            audio: HashMap::from([(5, Err(()))]),
            motion: HashMap::from([(5, 2.0), (10, 1.0)]),
        };
        let scores = scorer()
            .score_with(&mut probe, &windows, &Deadline::unbounded())
            .unwrap();
        assert_eq!(scores[1].audio_energy, 0.0);
        assert_eq!(select_best_window(&scores, secs(60)).start, secs(5));
    }

    #[test]
    fn ties_keep_the_earliest_window() {
        let windows = candidate_windows(secs(90), secs(60), secs(5));
        let mut probe = TableProbe {
            audio: HashMap::new(),
            motion: HashMap::from([(10, 7.0), (25, 7.0)]),
        };
        let scores = scorer()
            .score_with(&mut probe, &windows, &Deadline::unbounded())
            .unwrap();
        assert_eq!(select_best_window(&scores, secs(60)).start, secs(10));
    }

    #[test]
    fn all_zero_scores_fall_back_to_the_first_window() {
        let windows = candidate_windows(secs(120), secs(60), secs(5));
        let mut probe = TableProbe {
            audio: HashMap::new(),
            motion: HashMap::new(),
        };
        let scores = scorer()
            .score_with(&mut probe, &windows, &Deadline::unbounded())
            .unwrap();
        assert_eq!(
            select_best_window(&scores, secs(60)),
            Window::new(Duration::ZERO, secs(60))
        );
        assert_eq!(select_best_window(&[], secs(60)).end, secs(60));
    }

    #[test]
    fn expired_deadline_aborts_scoring() {
        let windows = candidate_windows(secs(90), secs(60), secs(5));
        let mut probe = TableProbe {
            audio: HashMap::new(),
            motion: HashMap::new(),
        };
        let expired = Deadline::after(Some(Duration::ZERO));
        let result = scorer().score_with(&mut probe, &windows, &expired);
        assert!(matches!(result, Err(ReelcutError::Timeout(_))));
    }

    #[test]
    fn frame_difference_is_absolute() {
        let dark = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let bright = RgbImage::from_pixel(2, 2, Rgb([20, 10, 30]));
        assert_eq!(frame_difference(&dark, &bright), 4 * 20);
        assert_eq!(frame_difference(&bright, &dark), 4 * 20);
        assert_eq!(frame_difference(&dark, &dark), 0);
    }

    #[test]
    fn frame_difference_of_mismatched_sizes_uses_overlap() {
        let small = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let large = RgbImage::from_pixel(3, 3, Rgb([1, 1, 1]));
        assert_eq!(frame_difference(&small, &large), 3);
    }

    #[test]
    fn profile_answers_windowed_sums() {
        // 10 seconds, 2 samples per second, audio amplitude equal to the second.
        let audio = (0..10).map(|k| (2.0 * k as f64, 2)).collect();
        let motion = (0..10).map(|k| k as f64).collect();
        let mut profile = SignalProfile::from_buckets(audio, motion);

        let window = Window::new(secs(2), secs(4));
        let audio = profile.audio_energy(window).unwrap();
        assert!((audio - (2.0 + 3.0 + 4.0 + 5.0) / 4.0).abs() < 1e-9);
        // Pairs (2,3), (3,4), (4,5) -> motion[3] + motion[4] + motion[5].
        assert_eq!(profile.motion_energy(window).unwrap(), 12.0);
    }

    #[test]
    fn profile_failures_surface_as_sample_failures() {
        let mut profile = SignalProfile {
            audio_failure: Some(SignalFailure {
                at: 0.0,
                reason: "no audio".into(),
            }),
            ..SignalProfile::default()
        };
        let window = Window::new(secs(0), secs(5));
        assert!(matches!(
            profile.audio_energy(window),
            Err(ReelcutError::DecodeSampleFailure(_))
        ));
        let scored = score_window(&mut profile, window, &ScoringConfig::default()).unwrap();
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn partial_failure_only_zeroes_windows_reaching_it() {
        // 120 seconds of steady signal; audio decoding broke at 70 s and
        // motion sampling at 100 s.
        let audio = (0..120).map(|_| (50.0, 100)).collect();
        let motion = (0..120).map(|k| if k == 0 { 0.0 } else { 3.0 }).collect();
        let mut profile = SignalProfile::from_buckets(audio, motion);
        profile.audio_sums.truncate(70);
        profile.audio_counts.truncate(70);
        profile.audio_failure = Some(SignalFailure {
            at: 70.0,
            reason: "corrupt packet".into(),
        });
        profile.motion.truncate(100);
        profile.motion_failure = Some(SignalFailure {
            at: 100.0,
            reason: "corrupt frame".into(),
        });

        let windows = candidate_windows(secs(120), secs(60), secs(5));
        let scores = scorer()
            .score_with(&mut profile, &windows, &Deadline::unbounded())
            .unwrap();

        // Windows ending at or before 70 s keep their audio.
        for score in &scores[..3] {
            assert!((score.audio_energy - 0.5).abs() < 1e-9, "{score:?}");
        }
        for score in &scores[3..] {
            assert_eq!(score.audio_energy, 0.0, "{score:?}");
        }
        // Windows ending at or before 100 s keep their motion.
        for score in &scores[..9] {
            assert_eq!(score.motion_energy, 59.0 * 3.0, "{score:?}");
        }
        for score in &scores[9..] {
            assert_eq!(score.motion_energy, 0.0, "{score:?}");
        }
        assert_eq!(select_best_window(&scores, secs(60)).start, Duration::ZERO);
    }
}
