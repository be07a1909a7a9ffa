//! Highlight window selection tests.
//!
//! Tests that decode media require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use reelcut::{
    CandidateScore, Deadline, EnergyProbe, MediaFile, OperationType, ProgressCallback,
    ProgressInfo, ReelcutError, ScoringConfig, ScoringMode, SegmentScorer, SignalProfile, Window,
    candidate_windows, select_best_window,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn short_video_path() -> &'static str {
    "tests/fixtures/short_silent.mp4"
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

fn scorer_for(mode: ScoringMode) -> SegmentScorer {
    SegmentScorer::new(ScoringConfig {
        mode,
        ..ScoringConfig::default()
    })
}

fn assert_close(a: f64, b: f64, tolerance: f64, what: &str) {
    let scale = a.abs().max(b.abs()).max(f64::EPSILON);
    assert!((a - b).abs() / scale <= tolerance, "{what}: {a} vs {b}");
}

#[derive(Default)]
struct ProgressRecorder {
    seen: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for ProgressRecorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.seen.lock().unwrap().push(info.clone());
    }
}

/// Source that fails audio for every window and reports motion from a table.
struct MotionOnlyProbe {
    motion: HashMap<u64, f64>,
}

impl EnergyProbe for MotionOnlyProbe {
    fn audio_energy(&mut self, _window: Window) -> Result<f64, ReelcutError> {
        Err(ReelcutError::NoAudioStream)
    }

    fn motion_energy(&mut self, window: Window) -> Result<f64, ReelcutError> {
        Ok(self.motion.get(&window.start.as_secs()).copied().unwrap_or(0.0))
    }
}

// ── Pure selection ───────────────────────────────────────────────

#[test]
fn candidates_cover_every_stride_offset() {
    let windows = candidate_windows(secs(75), secs(60), secs(5));
    let starts: Vec<u64> = windows.iter().map(|w| w.start.as_secs()).collect();
    assert_eq!(starts, vec![0, 5, 10, 15]);
    assert!(windows.iter().all(|w| w.length() == secs(60)));
    assert!(windows.iter().all(|w| w.end <= secs(75)));
}

#[test]
fn exact_multiple_includes_last_window() {
    let windows = candidate_windows(secs(120), secs(60), secs(5));
    assert_eq!(windows.len(), 13);
    assert_eq!(windows.last().map(|w| w.end), Some(secs(120)));
}

#[test]
fn earliest_window_wins_ties() {
    let candidates: Vec<CandidateScore> = [0, 5, 10]
        .into_iter()
        .map(|start| CandidateScore {
            window: Window::new(secs(start), secs(60)),
            audio_energy: 1.0,
            motion_energy: 1.0,
            score: 1.0,
        })
        .collect();
    assert_eq!(
        select_best_window(&candidates, secs(60)),
        Window::new(secs(0), secs(60))
    );
}

#[test]
fn all_zero_scores_fall_back_to_start() {
    let candidates = vec![CandidateScore {
        window: Window::new(secs(5), secs(60)),
        audio_energy: 0.0,
        motion_energy: 0.0,
        score: 0.0,
    }];
    assert_eq!(
        select_best_window(&candidates, secs(60)),
        Window::new(Duration::ZERO, secs(60))
    );
}

#[test]
fn audio_failure_counts_as_silence() {
    let scorer = SegmentScorer::new(ScoringConfig::default());
    let mut probe = MotionOnlyProbe {
        motion: HashMap::from([(0, 10.0), (5, 50.0), (10, 20.0)]),
    };
    let windows = candidate_windows(secs(70), secs(60), secs(5));
    let scores = scorer
        .score_with(&mut probe, &windows, &Deadline::unbounded())
        .expect("Absorbed failures must not abort scoring");

    assert_eq!(scores.len(), 3);
    assert!(scores.iter().all(|score| score.audio_energy == 0.0));
    assert!((scores[1].score - 0.4 * 50.0).abs() < 1e-9);
    assert_eq!(select_best_window(&scores, secs(60)).start, secs(5));
}

#[test]
fn profile_prefers_loud_busy_seconds() {
    // 70 one-second buckets; seconds 60..70 are loud and busy.
    let audio: Vec<(f64, u64)> = (0..70)
        .map(|second| if second >= 60 { (900.0, 100) } else { (10.0, 100) })
        .collect();
    let motion: Vec<f64> = (0..70)
        .map(|second| if second >= 60 { 1_000.0 } else { 5.0 })
        .collect();
    let mut profile = SignalProfile::from_buckets(audio, motion);

    let scorer = SegmentScorer::new(ScoringConfig::default());
    let windows = candidate_windows(secs(70), secs(60), secs(5));
    let scores = scorer
        .score_with(&mut profile, &windows, &Deadline::unbounded())
        .unwrap();
    assert_eq!(
        select_best_window(&scores, secs(60)),
        Window::new(secs(10), secs(60))
    );
}

#[test]
fn expired_deadline_aborts_scoring() {
    let scorer = SegmentScorer::new(ScoringConfig::default());
    let mut probe = MotionOnlyProbe {
        motion: HashMap::new(),
    };
    let windows = candidate_windows(secs(70), secs(60), secs(5));
    let result = scorer.score_with(
        &mut probe,
        &windows,
        &Deadline::after(Some(Duration::ZERO)),
    );
    assert!(matches!(result, Err(ReelcutError::Timeout(_))));
}

// ── Decoding sources ─────────────────────────────────────────────

#[test]
fn short_source_uses_whole_duration() {
    let path = short_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut media = MediaFile::open(path).expect("Failed to open test video");
    let duration = media.metadata().duration;
    let scorer = SegmentScorer::new(ScoringConfig::default());
    let window = scorer
        .best_window(&mut media, &Deadline::unbounded())
        .unwrap();
    assert_eq!(window, Window::new(Duration::ZERO, duration));
}

#[test]
fn selection_is_deterministic() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let scorer = SegmentScorer::new(ScoringConfig::default());
    let mut first = MediaFile::open(path).expect("Failed to open test video");
    let mut second = MediaFile::open(path).expect("Failed to open test video");
    let a = scorer.score_candidates(&mut first, &Deadline::unbounded()).unwrap();
    let b = scorer.score_candidates(&mut second, &Deadline::unbounded()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);
    assert!(a.iter().all(|candidate| candidate.audio_energy > 0.0));
    assert!(a.iter().all(|candidate| candidate.motion_energy > 0.0));
}

#[test]
fn both_modes_pick_a_full_length_window() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    for mode in [ScoringMode::SinglePass, ScoringMode::PerWindow] {
        let scorer = scorer_for(mode);
        let mut media = MediaFile::open(path).expect("Failed to open test video");
        let duration = media.metadata().duration;
        let window = scorer
            .best_window(&mut media, &Deadline::unbounded())
            .unwrap();
        assert_eq!(window.length(), secs(60), "{mode:?}");
        assert!(window.end <= duration, "{mode:?}");
        assert_eq!(window.start.as_secs() % 5, 0, "{mode:?}");
    }
}

#[test]
fn louder_half_raises_audio_energy() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut media = MediaFile::open(path).expect("Failed to open test video");
    let config = ScoringConfig::default();
    let mut profile = SignalProfile::measure(&mut media, &config, &Deadline::unbounded()).unwrap();
    let quiet = profile.audio_energy(Window::new(secs(0), secs(30))).unwrap();
    let loud = profile.audio_energy(Window::new(secs(45), secs(30))).unwrap();
    assert!(loud > quiet * 2.0, "quiet={quiet} loud={loud}");
}

#[test]
fn busy_loud_tail_wins_in_both_modes() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // Still and quiet until 40 s, moving and loud after: the window that
    // covers the most of 40..75 is the one starting at 15 s.
    for mode in [ScoringMode::SinglePass, ScoringMode::PerWindow] {
        let mut media = MediaFile::open(path).expect("Failed to open test video");
        let window = scorer_for(mode)
            .best_window(&mut media, &Deadline::unbounded())
            .unwrap();
        assert_eq!(window, Window::new(secs(15), secs(60)), "{mode:?}");
    }
}

#[test]
fn single_pass_matches_per_window_decoding() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut first = MediaFile::open(path).expect("Failed to open test video");
    let mut second = MediaFile::open(path).expect("Failed to open test video");
    let single = scorer_for(ScoringMode::SinglePass)
        .score_candidates(&mut first, &Deadline::unbounded())
        .unwrap();
    let per_window = scorer_for(ScoringMode::PerWindow)
        .score_candidates(&mut second, &Deadline::unbounded())
        .unwrap();

    assert_eq!(single.len(), per_window.len());
    for (a, b) in single.iter().zip(&per_window) {
        assert_eq!(a.window, b.window);
        let at = format!("window at {}s", a.window.start.as_secs());
        assert_close(a.audio_energy, b.audio_energy, 0.01, &format!("audio, {at}"));
        assert_eq!(a.motion_energy, b.motion_energy, "motion, {at}");
    }
}

#[test]
fn per_window_scoring_reports_each_candidate() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let recorder = Arc::new(ProgressRecorder::default());
    let scorer = scorer_for(ScoringMode::PerWindow).with_progress(recorder.clone());
    let mut media = MediaFile::open(path).expect("Failed to open test video");
    let scores = scorer
        .score_candidates(&mut media, &Deadline::unbounded())
        .unwrap();

    let seen = recorder.seen.lock().unwrap();
    let mut counts: Vec<u64> = seen.iter().map(|info| info.current).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=scores.len() as u64).collect::<Vec<_>>());
    assert!(seen.iter().all(|info| info.operation == OperationType::Scoring));
    assert!(seen.iter().all(|info| info.total == Some(scores.len() as u64)));
}
