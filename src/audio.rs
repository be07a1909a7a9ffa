//! Audio decoding.
//!
//! Decodes a time range of the source's best audio stream into interleaved
//! `f32` samples at a requested rate and channel layout. The scorer streams
//! chunks through [`for_each_audio_chunk`]; the renderer collects a whole
//! window into an [`AudioBuffer`] via [`decode_range`].

use std::time::Duration;

use ffmpeg_next::{
    ChannelLayout, Rational,
    codec::context::Context as CodecContext,
    decoder::Audio as AudioDecoder,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    software::resampling::Context as ResamplingContext,
};

use crate::{
    conversion::{bytes_to_samples, duration_to_seek_timestamp, pts_to_seconds},
    error::ReelcutError,
    media::MediaFile,
    progress::Deadline,
};

/// Decoded PCM audio, interleaved `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples (`frames × channels`).
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in hertz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create an empty buffer with the given layout.
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            channels,
            sample_rate,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// `true` when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean absolute amplitude over every sample, 0 for an empty buffer.
    pub fn mean_abs(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| f64::from(s.abs())).sum();
        sum / self.samples.len() as f64
    }
}

/// Channel layout used for `channels` output channels.
pub(crate) fn layout_for_channels(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        n => ChannelLayout::default(i32::from(n)),
    }
}

/// Decode `[start, end)` of the best audio stream and hand each chunk of
/// interleaved samples to `handler` together with the source time (seconds)
/// of its first sample.
///
/// Chunks are trimmed to the range at sample precision. Decoding stops as
/// soon as a chunk starts at or after `end`.
pub(crate) fn for_each_audio_chunk<F>(
    media: &mut MediaFile,
    start: Duration,
    end: Duration,
    sample_rate: u32,
    channels: u16,
    deadline: &Deadline,
    mut handler: F,
) -> Result<(), ReelcutError>
where
    F: FnMut(f64, &[f32]) -> Result<(), ReelcutError>,
{
    if start >= end {
        return Err(ReelcutError::InvalidRange { start, end });
    }

    let audio_stream_index = media
        .audio_stream_index
        .ok_or(ReelcutError::NoAudioStream)?;
    let stream = media
        .input_context
        .stream(audio_stream_index)
        .ok_or(ReelcutError::NoAudioStream)?;
    let time_base = stream.time_base();
    let decoder_context = CodecContext::from_parameters(stream.parameters())?;
    let mut decoder = decoder_context.decoder().audio().map_err(|error| {
        ReelcutError::DecodeFailure(format!("Failed to create audio decoder: {error}"))
    })?;

    log::debug!(
        "Decoding audio {:.2}s..{:.2}s at {sample_rate} Hz x{channels} (stream={audio_stream_index})",
        start.as_secs_f64(),
        end.as_secs_f64(),
    );

    // Always seek: earlier passes over the same handle leave the demuxer
    // at an arbitrary position.
    let seek_timestamp = duration_to_seek_timestamp(start);
    media.input_context.seek(seek_timestamp, ..seek_timestamp)?;

    let mut state = ChunkDecoder {
        trimmer: ChunkTrimmer {
            range: (start.as_secs_f64(), end.as_secs_f64()),
            sample_rate,
            channels: usize::from(channels.max(1)),
            next_time: None,
            finished: false,
        },
        output_layout: layout_for_channels(channels),
        time_base,
        resampler: None,
        decoded_frame: AudioFrame::empty(),
        resampled_frame: AudioFrame::empty(),
    };

    for (stream, packet) in media.input_context.packets() {
        deadline.check()?;
        if stream.index() != audio_stream_index {
            continue;
        }
        decoder.send_packet(&packet).map_err(|error| {
            ReelcutError::DecodeFailure(format!("Audio decode error: {error}"))
        })?;
        state.drain(&mut decoder, &mut handler)?;
        if state.trimmer.finished {
            return Ok(());
        }
    }

    decoder.send_eof()?;
    state.drain(&mut decoder, &mut handler)?;

    Ok(())
}

/// Decoder-side state of one [`for_each_audio_chunk`] call.
struct ChunkDecoder {
    trimmer: ChunkTrimmer,
    output_layout: ChannelLayout,
    time_base: Rational,
    /// Built from the first decoded frame so its input format always
    /// matches what the decoder actually produces.
    resampler: Option<ResamplingContext>,
    decoded_frame: AudioFrame,
    resampled_frame: AudioFrame,
}

impl ChunkDecoder {
    fn drain<F>(&mut self, decoder: &mut AudioDecoder, handler: &mut F) -> Result<(), ReelcutError>
    where
        F: FnMut(f64, &[f32]) -> Result<(), ReelcutError>,
    {
        while !self.trimmer.finished && decoder.receive_frame(&mut self.decoded_frame).is_ok() {
            if self.decoded_frame.channel_layout().is_empty() {
                let fallback = ChannelLayout::default(i32::from(self.decoded_frame.channels()));
                self.decoded_frame.set_channel_layout(fallback);
            }

            if self.resampler.is_none() {
                let context = ResamplingContext::get(
                    self.decoded_frame.format(),
                    self.decoded_frame.channel_layout(),
                    self.decoded_frame.rate(),
                    Sample::F32(SampleType::Packed),
                    self.output_layout,
                    self.trimmer.sample_rate,
                )
                .map_err(|error| {
                    ReelcutError::DecodeFailure(format!("Failed to create resampler: {error}"))
                })?;
                self.resampler = Some(context);
            }
            let Some(resampler) = self.resampler.as_mut() else {
                continue;
            };

            resampler
                .run(&self.decoded_frame, &mut self.resampled_frame)
                .map_err(|error| ReelcutError::DecodeFailure(format!("Resample error: {error}")))?;

            let sample_count = self.resampled_frame.samples() * self.trimmer.channels;
            if sample_count == 0 {
                continue;
            }
            let frame_time = self
                .decoded_frame
                .timestamp()
                .or(self.decoded_frame.pts())
                .map(|pts| pts_to_seconds(pts, self.time_base));
            let samples: Vec<f32> =
                bytes_to_samples(self.resampled_frame.data(0), sample_count).collect();
            if let Some((chunk_time, kept)) = self.trimmer.trim(frame_time, &samples) {
                handler(chunk_time, kept)?;
            }
        }
        Ok(())
    }
}

/// Decode `[start, end)` of the best audio stream into one buffer.
pub(crate) fn decode_range(
    media: &mut MediaFile,
    start: Duration,
    end: Duration,
    sample_rate: u32,
    channels: u16,
    deadline: &Deadline,
) -> Result<AudioBuffer, ReelcutError> {
    let mut buffer = AudioBuffer::new(channels, sample_rate);
    let expected = (end.saturating_sub(start).as_secs_f64() * f64::from(sample_rate)) as usize
        * usize::from(channels);
    buffer.samples.reserve(expected);

    for_each_audio_chunk(media, start, end, sample_rate, channels, deadline, |_, chunk| {
        buffer.samples.extend_from_slice(chunk);
        Ok(())
    })?;

    log::debug!(
        "Decoded {} audio frames ({:.2}s)",
        buffer.frames(),
        buffer.duration().as_secs_f64()
    );
    Ok(buffer)
}

/// Cuts resampled chunks to a time range at sample precision.
struct ChunkTrimmer {
    range: (f64, f64),
    sample_rate: u32,
    channels: usize,
    /// Running clock used when a frame carries no timestamp.
    next_time: Option<f64>,
    finished: bool,
}

impl ChunkTrimmer {
    /// Returns the start time of the kept part and the kept samples, if any.
    fn trim<'s>(&mut self, frame_time: Option<f64>, samples: &'s [f32]) -> Option<(f64, &'s [f32])> {
        let rate = f64::from(self.sample_rate);
        let frames = samples.len() / self.channels;
        let chunk_start = frame_time.or(self.next_time).unwrap_or(self.range.0);
        let chunk_end = chunk_start + frames as f64 / rate;
        self.next_time = Some(chunk_end);

        let (start, end) = self.range;
        if chunk_start >= end {
            self.finished = true;
            return None;
        }
        if chunk_end <= start {
            return None;
        }

        let skip = if chunk_start < start {
            (((start - chunk_start) * rate).round() as usize).min(frames)
        } else {
            0
        };
        let keep_until = if chunk_end > end {
            (((end - chunk_start) * rate).round() as usize).min(frames)
        } else {
            frames
        };
        if keep_until <= skip {
            return None;
        }

        let kept_start = chunk_start.max(start);
        Some((
            kept_start,
            &samples[skip * self.channels..keep_until * self.channels],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trimmer(start: f64, end: f64) -> ChunkTrimmer {
        ChunkTrimmer {
            range: (start, end),
            sample_rate: 10,
            channels: 1,
            next_time: None,
            finished: false,
        }
    }

    #[test]
    fn trim_drops_samples_before_range() {
        let mut trimmer = trimmer(1.0, 5.0);
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let (time, kept) = trimmer.trim(Some(0.5), &samples).unwrap();
        assert!((time - 1.0).abs() < 1e-9);
        assert_eq!(kept, &samples[5..]);
    }

    #[test]
    fn trim_cuts_at_range_end_and_finishes() {
        let mut trimmer = trimmer(0.0, 1.5);
        let samples = vec![0.25f32; 10];
        let (_, first) = trimmer.trim(Some(0.0), &samples).unwrap();
        assert_eq!(first.len(), 10);
        let (_, second) = trimmer.trim(None, &samples).unwrap();
        assert_eq!(second.len(), 5);
        assert!(trimmer.trim(None, &samples).is_none());
        assert!(trimmer.finished);
    }

    #[test]
    fn trim_respects_interleaved_channels() {
        let mut trimmer = ChunkTrimmer {
            channels: 2,
            ..trimmer(0.2, 10.0)
        };
        let samples: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let (_, kept) = trimmer.trim(Some(0.0), &samples).unwrap();
        assert_eq!(kept.first(), Some(&4.0));
        assert_eq!(kept.len(), 16);
    }

    #[test]
    fn buffer_statistics() {
        let buffer = AudioBuffer {
            samples: vec![0.5, -0.5, 1.0, -1.0],
            channels: 2,
            sample_rate: 2,
        };
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert!((buffer.mean_abs() - 0.75).abs() < 1e-9);
        assert_eq!(AudioBuffer::new(1, 44_100).mean_abs(), 0.0);
    }
}
