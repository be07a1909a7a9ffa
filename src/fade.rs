//! Fade-in and fade-out.
//!
//! [`Fades`] is a gain envelope over a clip of known duration: a linear ramp
//! up from black/silence at the start and down at the end. Overlapping
//! ramps on very short clips simply multiply.

use std::time::Duration;

use image::RgbImage;

use crate::{audio::AudioBuffer, config::FadeConfig};

/// Gain envelope for one clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fades {
    fade_in: f64,
    fade_out: f64,
    clip_duration: f64,
}

impl Fades {
    /// Envelope for a clip of `clip_duration` with the given ramp lengths.
    pub fn new(fade_in: Duration, fade_out: Duration, clip_duration: Duration) -> Self {
        Self {
            fade_in: fade_in.as_secs_f64(),
            fade_out: fade_out.as_secs_f64(),
            clip_duration: clip_duration.as_secs_f64(),
        }
    }

    /// Envelope from configured ramp lengths.
    pub fn from_config(config: &FadeConfig, clip_duration: Duration) -> Self {
        Self::new(config.fade_in, config.fade_out, clip_duration)
    }

    /// Gain in `[0, 1]` at clip time `t` seconds.
    pub fn gain(&self, t: f64) -> f32 {
        let rise = if self.fade_in > 0.0 {
            (t / self.fade_in).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let fall = if self.fade_out > 0.0 {
            ((self.clip_duration - t) / self.fade_out).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (rise * fall) as f32
    }

    /// Darken `frame` towards black by the gain at `t`.
    pub fn apply_to_frame(&self, frame: &mut RgbImage, t: f64) {
        let gain = self.gain(t);
        if gain >= 1.0 {
            return;
        }
        for value in frame.iter_mut() {
            *value = (f32::from(*value) * gain).round() as u8;
        }
    }

    /// Apply the envelope to every sample of `audio`, whose first sample is
    /// at clip time 0.
    pub fn apply_to_audio(&self, audio: &mut AudioBuffer) {
        let channels = usize::from(audio.channels.max(1));
        let rate = f64::from(audio.sample_rate.max(1));
        for (index, frame) in audio.samples.chunks_mut(channels).enumerate() {
            let gain = self.gain(index as f64 / rate);
            for sample in frame {
                *sample *= gain;
            }
        }
    }
}
