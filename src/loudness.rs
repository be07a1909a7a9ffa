//! Audio loudness analysis and normalization.
//!
//! This module provides [`LoudnessInfo`] for computing loudness statistics of
//! decoded audio (peak amplitude, RMS and their dBFS equivalents) and
//! [`AudioConditioner`], the peak normalizer applied to every rendered clip.
//!
//! # Example
//!
//! ```
//! use reelcut::{AudioBuffer, AudioConditioner, LoudnessInfo};
//!
//! let quiet = AudioBuffer { samples: vec![0.25, -0.5, 0.1], channels: 1, sample_rate: 3 };
//! let normalized = AudioConditioner::new(1.0).normalize(Some(quiet)).unwrap();
//! let loudness = LoudnessInfo::measure(&normalized);
//! assert!((loudness.peak - 1.0).abs() < 1e-6);
//! ```

use std::time::Duration;

use crate::audio::AudioBuffer;

/// Audio loudness statistics.
#[derive(Debug, Clone, Copy)]
pub struct LoudnessInfo {
    /// Peak sample amplitude (linear, 0.0–1.0).
    pub peak: f32,
    /// Peak in dBFS (decibels relative to full scale). 0.0 dBFS = maximum.
    pub peak_dbfs: f64,
    /// Root-mean-square amplitude (linear).
    pub rms: f32,
    /// RMS in dBFS.
    pub rms_dbfs: f64,
    /// Duration of the analyzed audio.
    pub duration: Duration,
    /// Total number of samples analyzed, across all channels.
    pub total_samples: u64,
}

impl LoudnessInfo {
    /// Compute statistics over every sample of `buffer`.
    pub fn measure(buffer: &AudioBuffer) -> Self {
        let mut peak: f32 = 0.0;
        let mut sum_sq: f64 = 0.0;
        for &s in &buffer.samples {
            peak = peak.max(s.abs());
            sum_sq += f64::from(s) * f64::from(s);
        }
        let total_samples = buffer.samples.len() as u64;

        let rms = if total_samples > 0 {
            (sum_sq / total_samples as f64).sqrt() as f32
        } else {
            0.0
        };

        Self {
            peak,
            peak_dbfs: to_dbfs(peak),
            rms,
            rms_dbfs: to_dbfs(rms),
            duration: buffer.duration(),
            total_samples,
        }
    }
}

fn to_dbfs(level: f32) -> f64 {
    if level > 0.0 {
        20.0 * f64::from(level).log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Peak normalizer.
#[derive(Debug, Clone, Copy)]
pub struct AudioConditioner {
    target_peak: f32,
}

impl AudioConditioner {
    /// Normalize to `target_peak` (1.0 = 0 dBFS).
    pub fn new(target_peak: f32) -> Self {
        Self { target_peak }
    }

    /// Scale `audio` so its peak equals the target.
    ///
    /// Absent audio is returned as `None`; a silent or empty buffer is
    /// returned unchanged.
    pub fn normalize(&self, audio: Option<AudioBuffer>) -> Option<AudioBuffer> {
        let mut buffer = audio?;
        let before = LoudnessInfo::measure(&buffer);
        if before.peak <= 0.0 {
            log::debug!("Audio is silent, skipping normalization");
            return Some(buffer);
        }

        let gain = self.target_peak / before.peak;
        for sample in &mut buffer.samples {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
        log::debug!(
            "Normalized audio: peak {:.2} dBFS -> {:.2} dBFS (rms {:.2} dBFS, gain {gain:.3})",
            before.peak_dbfs,
            to_dbfs(self.target_peak),
            before.rms_dbfs + 20.0 * f64::from(gain).log10(),
        );
        Some(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer {
            samples,
            channels: 1,
            sample_rate: 4,
        }
    }

    #[test]
    fn absent_audio_stays_absent() {
        assert!(AudioConditioner::new(1.0).normalize(None).is_none());
    }

    #[test]
    fn silent_audio_is_unchanged() {
        let silent = buffer(vec![0.0; 8]);
        let result = AudioConditioner::new(1.0).normalize(Some(silent.clone()));
        assert_eq!(result, Some(silent));
    }

    #[test]
    fn peak_is_raised_to_target() {
        let result = AudioConditioner::new(1.0)
            .normalize(Some(buffer(vec![0.1, -0.5, 0.25, 0.0])))
            .unwrap();
        assert_eq!(result.samples, vec![0.2, -1.0, 0.5, 0.0]);
    }

    #[test]
    fn loud_audio_is_lowered_to_target() {
        let result = AudioConditioner::new(0.5)
            .normalize(Some(buffer(vec![1.0, -0.5])))
            .unwrap();
        assert_eq!(result.samples, vec![0.5, -0.25]);
    }

    #[test]
    fn measure_reports_dbfs() {
        let info = LoudnessInfo::measure(&buffer(vec![0.5, -0.5, 0.5, -0.5]));
        assert!((info.peak - 0.5).abs() < 1e-6);
        assert!((info.rms - 0.5).abs() < 1e-6);
        assert!((info.peak_dbfs + 6.0206).abs() < 1e-3);
        assert_eq!(info.total_samples, 4);
        assert_eq!(info.duration, Duration::from_secs(1));
        assert_eq!(LoudnessInfo::measure(&buffer(vec![])).peak_dbfs, f64::NEG_INFINITY);
    }
}
