//! RenderConfig, ScoringConfig and the geometry defaults.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use reelcut::{
    AudioOutputConfig, FadeConfig, ProgressCallback, ProgressInfo, ReframeConfig, RenderConfig,
    ScoringConfig, ScoringMode, VideoOutputConfig, WatermarkConfig, WatermarkSpec, logo_scale,
};

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn scoring_defaults() {
    let config = ScoringConfig::default();
    assert_eq!(config.target_duration, Duration::from_secs(60));
    assert_eq!(config.stride, Duration::from_secs(5));
    assert!((config.audio_weight - 0.6).abs() < 1e-12);
    assert!((config.motion_weight - 0.4).abs() < 1e-12);
    assert_eq!(config.audio_sample_rate, 22_000);
    assert_eq!(config.mode, ScoringMode::SinglePass);
}

#[test]
fn reframe_defaults() {
    let config = ReframeConfig::default();
    assert!((config.zoom - 1.05).abs() < 1e-12);
    assert!((config.target_ratio - 0.5625).abs() < 1e-12);
    assert_eq!(config.target_height, 1920);
}

#[test]
fn watermark_defaults() {
    let config = WatermarkConfig::new("logo.png");
    assert_eq!(config.compact_ratio_range, (0.55, 0.65));
    assert!((config.compact_scale - 0.08).abs() < 1e-12);
    assert!((config.default_scale - 0.13).abs() < 1e-12);
    assert_eq!(config.margin_right, 30);
    assert_eq!(config.margin_bottom, 100);
    assert!((config.vertical_anchor - 0.92).abs() < 1e-12);
    assert!((config.bob_amplitude - 3.0).abs() < 1e-12);
}

#[test]
fn output_defaults() {
    let fades = FadeConfig::default();
    assert_eq!(fades.fade_in, Duration::from_secs(1));
    assert_eq!(fades.fade_out, Duration::from_secs(1));

    let audio = AudioOutputConfig::default();
    assert_eq!(audio.sample_rate, 44_100);
    assert_eq!(audio.channels, 2);

    let video = VideoOutputConfig::default();
    assert_eq!(video.crf, 23);
    assert_eq!(video.preset, "medium");
}

#[test]
fn render_config_defaults() {
    let config = RenderConfig::new("videos_editados", "logo.png");
    assert_eq!(config.output_dir().to_str(), Some("videos_editados"));
    assert_eq!(config.watermark().logo_path.to_str(), Some("logo.png"));
    assert_eq!(config.target_duration(), Duration::from_secs(60));
    assert!(config.delete_source());
    assert!(config.timeout().is_some());

    let debug = format!("{config:?}");
    assert!(debug.contains("RenderConfig"));
    assert!(debug.contains("delete_source: true"));
}

// ── Builders ─────────────────────────────────────────────────────

#[test]
fn render_config_builders() {
    let config = RenderConfig::new("out", "logo.png")
        .with_target_duration(Duration::from_secs(30))
        .with_scoring_mode(ScoringMode::PerWindow)
        .with_delete_source(false)
        .with_timeout(None)
        .with_fades(FadeConfig {
            fade_in: Duration::from_millis(500),
            fade_out: Duration::ZERO,
        });

    assert_eq!(config.target_duration(), Duration::from_secs(30));
    assert_eq!(config.scoring().target_duration, Duration::from_secs(30));
    assert_eq!(config.scoring().mode, ScoringMode::PerWindow);
    assert!(!config.delete_source());
    assert!(config.timeout().is_none());
    assert_eq!(config.fades().fade_in, Duration::from_millis(500));
    assert_eq!(config.fades().fade_out, Duration::ZERO);
}

#[test]
fn scoring_override_keeps_other_sections() {
    let scoring = ScoringConfig {
        stride: Duration::from_secs(10),
        ..ScoringConfig::default()
    };
    let config = RenderConfig::new("out", "logo.png")
        .with_scoring(scoring)
        .with_reframe(ReframeConfig {
            target_height: 1280,
            ..ReframeConfig::default()
        });
    assert_eq!(config.scoring().stride, Duration::from_secs(10));
    assert_eq!(config.reframe().target_height, 1280);
    assert_eq!(config.watermark().margin_right, 30);
}

#[test]
fn progress_callback_is_stored() {
    struct Counter(AtomicUsize);

    impl ProgressCallback for Counter {
        fn on_progress(&self, _info: &ProgressInfo) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    let counter = Arc::new(Counter(AtomicUsize::new(0)));
    let config = RenderConfig::new("out", "logo.png").with_progress(counter.clone());
    let cloned = config.clone();
    assert_eq!(Arc::strong_count(&counter), 3);
    drop(cloned);
    assert_eq!(counter.0.load(Ordering::Relaxed), 0);
}

// ── Watermark scale selection ───────────────────────────────────

#[test]
fn vertical_clip_gets_compact_logo() {
    let config = WatermarkConfig::new("logo.png");
    let spec = WatermarkSpec::for_clip(1080, 1920, &config);
    assert!((spec.scale - 0.08).abs() < 1e-12);
    assert_eq!(spec.logo_height, 153);
}

#[test]
fn landscape_and_boundary_ratios_get_default_logo() {
    let config = WatermarkConfig::new("logo.png");
    assert!((logo_scale(16.0 / 9.0, &config) - 0.13).abs() < 1e-12);
    assert!((logo_scale(0.55, &config) - 0.13).abs() < 1e-12);
    assert!((logo_scale(0.65, &config) - 0.13).abs() < 1e-12);
    assert!((logo_scale(0.6, &config) - 0.08).abs() < 1e-12);
}
