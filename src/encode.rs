//! Clip encoder: H.264 video plus AAC audio into one container.
//!
//! [`ClipEncoder`] receives finished RGB frames and interleaved `f32` audio,
//! converts them to the encoders' native formats and muxes the packets.
//! Frames are timestamped by index at the configured frame rate; audio is
//! timestamped by sample count.
//!
//! # Example
//!
//! ```no_run
//! use image::RgbImage;
//! use reelcut::{ClipEncoder, ClipEncoderSettings, ReelcutError};
//!
//! let settings = ClipEncoderSettings::new(1080, 1920, 30.0);
//! let mut encoder = ClipEncoder::create("out.mp4", "mp4", &settings)?;
//! for _ in 0..30 {
//!     encoder.push_video_frame(&RgbImage::new(1080, 1920))?;
//! }
//! encoder.finish()?;
//! # Ok::<(), ReelcutError>(())
//! ```

use std::path::Path;

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::encoder::{Audio as AudioEncoder, Video as VideoEncoder};
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel, Sample, sample::Type as SampleType};
use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Packet, Rational};
use image::RgbImage;

use crate::audio::layout_for_channels;
use crate::config::{AudioOutputConfig, VideoOutputConfig};
use crate::conversion::image_to_frame;
use crate::error::ReelcutError;

/// Output parameters for one clip.
#[derive(Debug, Clone)]
pub struct ClipEncoderSettings {
    /// Frame width (even).
    pub width: u32,
    /// Frame height (even).
    pub height: u32,
    /// Output frame rate.
    pub frames_per_second: f64,
    /// H.264 quality and preset.
    pub video: VideoOutputConfig,
    /// AAC track settings, or `None` for a silent clip.
    pub audio: Option<AudioOutputConfig>,
}

impl ClipEncoderSettings {
    /// Video-only settings with default quality.
    pub fn new(width: u32, height: u32, frames_per_second: f64) -> Self {
        Self {
            width,
            height,
            frames_per_second,
            video: VideoOutputConfig::default(),
            audio: None,
        }
    }

    /// Add an audio track.
    #[must_use]
    pub fn with_audio(mut self, audio: AudioOutputConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Replace the video quality settings.
    #[must_use]
    pub fn with_video(mut self, video: VideoOutputConfig) -> Self {
        self.video = video;
        self
    }
}

/// Container format name for an output file name, from its extension.
pub fn container_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mov") => "mov",
        Some("avi") => "avi",
        _ => "mp4",
    }
}

struct AudioTrack {
    encoder: AudioEncoder,
    stream_index: usize,
    time_base: Rational,
    stream_time_base: Rational,
    frame_size: usize,
    channels: usize,
    sample_rate: u32,
    /// Interleaved samples waiting for a full encoder frame.
    pending: Vec<f32>,
    next_pts: i64,
}

/// Streaming H.264/AAC muxer.
///
/// Created via [`ClipEncoder::create`]; frames and samples are pushed in
/// playback order and [`finish`](ClipEncoder::finish) flushes both encoders
/// and writes the trailer. Dropping an unfinished encoder leaves a truncated
/// file behind; callers write to a temporary path.
pub struct ClipEncoder {
    output: Output,
    video_encoder: VideoEncoder,
    video_stream_index: usize,
    video_time_base: Rational,
    video_stream_time_base: Rational,
    scaler: ScalingContext,
    width: u32,
    height: u32,
    frame_index: i64,
    audio: Option<AudioTrack>,
}

impl ClipEncoder {
    /// Open `path` as a `container` file and write its header.
    ///
    /// # Errors
    ///
    /// [`ReelcutError::EncodeFailure`] if the file cannot be created or an
    /// encoder cannot be opened.
    pub fn create<P: AsRef<Path>>(
        path: P,
        container: &str,
        settings: &ClipEncoderSettings,
    ) -> Result<Self, ReelcutError> {
        let path = path.as_ref();
        log::debug!(
            "Opening {container} encoder at {} ({}x{} @ {:.3} fps, audio={})",
            path.display(),
            settings.width,
            settings.height,
            settings.frames_per_second,
            settings.audio.is_some(),
        );

        let mut output = ffmpeg_next::format::output_as(path, container)
            .map_err(|e| ReelcutError::EncodeFailure(format!("cannot open output: {e}")))?;

        // Check if we need global header before adding the stream (avoids borrow conflict).
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let (video_encoder, video_stream_index, video_time_base) =
            open_video_stream(&mut output, settings, needs_global_header)?;

        let audio = match &settings.audio {
            Some(audio) => Some(open_audio_stream(&mut output, audio, needs_global_header)?),
            None => None,
        };

        output
            .write_header()
            .map_err(|e| ReelcutError::EncodeFailure(format!("cannot write header: {e}")))?;

        // Muxers may change stream time bases while writing the header.
        let stream_time_base = |output: &Output, index: usize| {
            output
                .stream(index)
                .map(|stream| stream.time_base())
                .ok_or_else(|| ReelcutError::EncodeFailure(format!("stream {index} vanished")))
        };
        let video_stream_time_base = stream_time_base(&output, video_stream_index)?;
        let audio = match audio {
            Some(mut track) => {
                track.stream_time_base = stream_time_base(&output, track.stream_index)?;
                Some(track)
            }
            None => None,
        };

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            settings.width,
            settings.height,
            Pixel::YUV420P,
            settings.width,
            settings.height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot create scaler: {e}")))?;

        Ok(Self {
            output,
            video_encoder,
            video_stream_index,
            video_time_base,
            video_stream_time_base,
            scaler,
            width: settings.width,
            height: settings.height,
            frame_index: 0,
            audio,
        })
    }

    /// Number of video frames pushed so far.
    pub fn frames_written(&self) -> u64 {
        self.frame_index as u64
    }

    /// Encode one frame. Frames of the wrong size are resized to fit.
    pub fn push_video_frame(&mut self, image: &RgbImage) -> Result<(), ReelcutError> {
        let resized;
        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            resized = image::imageops::resize(
                image,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        };

        let source_frame = image_to_frame(image);
        let mut frame = VideoFrame::empty();
        self.scaler
            .run(&source_frame, &mut frame)
            .map_err(|e| ReelcutError::EncodeFailure(format!("scaling failed: {e}")))?;
        frame.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.video_encoder
            .send_frame(&frame)
            .map_err(|e| ReelcutError::EncodeFailure(format!("send_frame failed: {e}")))?;
        self.drain_video()
    }

    /// Queue interleaved samples; full encoder frames are encoded at once.
    ///
    /// Ignored when the clip has no audio track.
    pub fn push_audio_samples(&mut self, samples: &[f32]) -> Result<(), ReelcutError> {
        let Some(track) = self.audio.as_mut() else {
            return Ok(());
        };
        track.pending.extend_from_slice(samples);
        let chunk = track.frame_size * track.channels;
        while track.pending.len() >= chunk {
            let frame_samples: Vec<f32> = track.pending.drain(..chunk).collect();
            encode_audio_frame(track, &frame_samples)?;
            write_audio_packets(track, &mut self.output)?;
        }
        Ok(())
    }

    /// Flush both encoders and write the container trailer.
    pub fn finish(mut self) -> Result<(), ReelcutError> {
        self.video_encoder
            .send_eof()
            .map_err(|e| ReelcutError::EncodeFailure(format!("send_eof failed: {e}")))?;
        self.drain_video()?;

        if let Some(track) = self.audio.as_mut() {
            if !track.pending.is_empty() {
                let remaining = std::mem::take(&mut track.pending);
                encode_audio_frame(track, &remaining)?;
            }
            track
                .encoder
                .send_eof()
                .map_err(|e| ReelcutError::EncodeFailure(format!("audio send_eof failed: {e}")))?;
            write_audio_packets(track, &mut self.output)?;
        }

        self.output
            .write_trailer()
            .map_err(|e| ReelcutError::EncodeFailure(format!("cannot write trailer: {e}")))?;

        log::debug!("Encoded {} frames", self.frame_index);
        Ok(())
    }

    fn drain_video(&mut self) -> Result<(), ReelcutError> {
        let mut packet = Packet::empty();
        while self.video_encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.video_stream_index);
            packet.rescale_ts(self.video_time_base, self.video_stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| ReelcutError::EncodeFailure(format!("write packet failed: {e}")))?;
        }
        Ok(())
    }
}

fn open_video_stream(
    output: &mut Output,
    settings: &ClipEncoderSettings,
    needs_global_header: bool,
) -> Result<(VideoEncoder, usize, Rational), ReelcutError> {
    let encoder_codec = ffmpeg_next::encoder::find(Id::H264)
        .ok_or_else(|| ReelcutError::EncodeFailure("H.264 encoder not available".to_string()))?;

    let mut stream = output
        .add_stream(encoder_codec)
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot add video stream: {e}")))?;
    let stream_index = stream.index();

    let mut encoder = CodecContext::from_parameters(stream.parameters())
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot create codec context: {e}")))?
        .encoder()
        .video()
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot open video encoder: {e}")))?;

    let frame_rate = Rational::from(settings.frames_per_second);
    let time_base = frame_rate.invert();
    encoder.set_width(settings.width);
    encoder.set_height(settings.height);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(time_base);
    encoder.set_frame_rate(Some(frame_rate));

    if needs_global_header {
        unsafe {
            (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    let mut options = Dictionary::new();
    options.set("crf", &settings.video.crf.to_string());
    options.set("preset", &settings.video.preset);

    let opened_encoder = encoder
        .open_as_with(encoder_codec, options)
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot open H.264 encoder: {e}")))?;

    stream.set_parameters(&opened_encoder);
    stream.set_time_base(time_base);

    Ok((opened_encoder, stream_index, time_base))
}

fn open_audio_stream(
    output: &mut Output,
    config: &AudioOutputConfig,
    needs_global_header: bool,
) -> Result<AudioTrack, ReelcutError> {
    let output_codec = ffmpeg_next::encoder::find(Id::AAC)
        .ok_or_else(|| ReelcutError::EncodeFailure("AAC encoder not available".to_string()))?;

    let mut stream = output
        .add_stream(output_codec)
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot add audio stream: {e}")))?;
    let stream_index = stream.index();

    let mut encoder_context = CodecContext::new()
        .encoder()
        .audio()
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot create audio encoder: {e}")))?;

    let time_base = Rational(1, config.sample_rate as i32);
    encoder_context.set_rate(config.sample_rate as i32);
    encoder_context.set_channel_layout(layout_for_channels(config.channels));
    encoder_context.set_format(Sample::F32(SampleType::Planar));
    encoder_context.set_bit_rate(config.bit_rate);
    encoder_context.set_time_base(time_base);

    if needs_global_header {
        unsafe {
            (*encoder_context.as_mut_ptr()).flags |=
                ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    let encoder = encoder_context
        .open_as(output_codec)
        .map_err(|e| ReelcutError::EncodeFailure(format!("cannot open AAC encoder: {e}")))?;

    stream.set_parameters(&encoder);
    stream.set_time_base(time_base);

    // Encoders without a fixed frame size accept any chunk length.
    let frame_size = match encoder.frame_size() {
        0 => 1024,
        size => size as usize,
    };

    Ok(AudioTrack {
        encoder,
        stream_index,
        time_base,
        stream_time_base: time_base,
        frame_size,
        channels: usize::from(config.channels.max(1)),
        sample_rate: config.sample_rate,
        pending: Vec::new(),
        next_pts: 0,
    })
}

/// Deinterleave `samples` into one planar frame and send it.
fn encode_audio_frame(track: &mut AudioTrack, samples: &[f32]) -> Result<(), ReelcutError> {
    let frame_samples = samples.len() / track.channels;
    if frame_samples == 0 {
        return Ok(());
    }
    let mut frame = AudioFrame::new(
        Sample::F32(SampleType::Planar),
        frame_samples,
        layout_for_channels(track.channels as u16),
    );
    frame.set_rate(track.sample_rate);
    for channel in 0..track.channels {
        let plane = frame.data_mut(channel);
        for (index, value) in samples
            .iter()
            .skip(channel)
            .step_by(track.channels)
            .enumerate()
        {
            plane[index * 4..index * 4 + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }
    frame.set_pts(Some(track.next_pts));
    track.next_pts += frame_samples as i64;

    track
        .encoder
        .send_frame(&frame)
        .map_err(|e| ReelcutError::EncodeFailure(format!("audio send_frame failed: {e}")))
}

fn write_audio_packets(track: &mut AudioTrack, output: &mut Output) -> Result<(), ReelcutError> {
    let mut packet = Packet::empty();
    while track.encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(track.stream_index);
        packet.rescale_ts(track.time_base, track.stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|e| ReelcutError::EncodeFailure(format!("write audio packet failed: {e}")))?;
    }
    Ok(())
}
