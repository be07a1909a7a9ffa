//! Video decoding.
//!
//! Decodes frames of the best video stream inside a time range. Rendering
//! consumes every frame through [`for_each_frame`]; scoring samples frames at
//! a fixed interval through [`sample_frames`], converted to RGB.

use std::time::Duration;

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{
    conversion::{duration_to_seek_timestamp, frame_to_image, pts_to_seconds},
    error::ReelcutError,
    media::MediaFile,
    progress::Deadline,
};

/// Decode every frame of the best video stream whose timestamp lies in
/// `[start, end)` and pass it, with that timestamp in source seconds, to
/// `handler`.
///
/// Frames without a timestamp are assigned one from the stream frame rate.
pub(crate) fn for_each_frame<F>(
    media: &mut MediaFile,
    start: Duration,
    end: Duration,
    deadline: &Deadline,
    mut handler: F,
) -> Result<(), ReelcutError>
where
    F: FnMut(f64, &VideoFrame) -> Result<(), ReelcutError>,
{
    if start >= end {
        return Err(ReelcutError::InvalidRange { start, end });
    }

    let video_stream_index = media
        .video_stream_index
        .ok_or(ReelcutError::NoVideoStream)?;
    let frames_per_second = media.video_metadata()?.frames_per_second;
    let stream = media
        .input_context
        .stream(video_stream_index)
        .ok_or(ReelcutError::NoVideoStream)?;
    let time_base = stream.time_base();
    let decoder_context = CodecContext::from_parameters(stream.parameters())?;
    let mut decoder = decoder_context.decoder().video().map_err(|error| {
        ReelcutError::DecodeFailure(format!("Failed to create video decoder: {error}"))
    })?;

    log::debug!(
        "Decoding video {:.2}s..{:.2}s (stream={video_stream_index})",
        start.as_secs_f64(),
        end.as_secs_f64(),
    );

    // Always seek: earlier passes over the same handle leave the demuxer
    // at an arbitrary position.
    let seek_timestamp = duration_to_seek_timestamp(start);
    media.input_context.seek(seek_timestamp, ..seek_timestamp)?;

    let range = (start.as_secs_f64(), end.as_secs_f64());
    let frame_step = if frames_per_second > 0.0 {
        1.0 / frames_per_second
    } else {
        0.0
    };
    let mut last_time: Option<f64> = None;
    let mut decoded_frame = VideoFrame::empty();

    // Returns `Ok(true)` once the range end has been passed.
    let mut deliver = |frame: &VideoFrame, handler: &mut F| -> Result<bool, ReelcutError> {
        let time = match frame.timestamp().or(frame.pts()) {
            Some(pts) => pts_to_seconds(pts, time_base),
            None => last_time.map_or(range.0, |previous| previous + frame_step),
        };
        last_time = Some(time);
        if time >= range.1 {
            return Ok(true);
        }
        if time >= range.0 {
            handler(time, frame)?;
        }
        Ok(false)
    };

    for (stream, packet) in media.input_context.packets() {
        deadline.check()?;
        if stream.index() != video_stream_index {
            continue;
        }
        decoder.send_packet(&packet).map_err(|error| {
            ReelcutError::DecodeFailure(format!("Video decode error: {error}"))
        })?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if deliver(&decoded_frame, &mut handler)? {
                return Ok(());
            }
        }
    }

    decoder.send_eof()?;
    while decoder.receive_frame(&mut decoded_frame).is_ok() {
        deadline.check()?;
        if deliver(&decoded_frame, &mut handler)? {
            break;
        }
    }

    Ok(())
}

/// Decode one RGB frame per `interval` across `[start, end)`.
///
/// Sample targets are `start, start + interval, …` strictly before `end`.
/// Each target is satisfied by the first decoded frame at or after it; a
/// single frame satisfies every target it reaches, so sources with a frame
/// rate below the sampling rate repeat frames. `handler` receives the target
/// time in source seconds and the frame.
pub(crate) fn sample_frames<F>(
    media: &mut MediaFile,
    start: Duration,
    end: Duration,
    interval: Duration,
    deadline: &Deadline,
    mut handler: F,
) -> Result<(), ReelcutError>
where
    F: FnMut(f64, &RgbImage) -> Result<(), ReelcutError>,
{
    if interval.is_zero() {
        return Err(ReelcutError::InvalidRange {
            start: interval,
            end: interval,
        });
    }

    let step = interval.as_secs_f64();
    let end_seconds = end.as_secs_f64();
    let mut next_target = start.as_secs_f64();
    let mut scaler: Option<ScalingContext> = None;
    let mut rgb_frame = VideoFrame::empty();

    for_each_frame(media, start, end, deadline, |time, frame| {
        if time < next_target || next_target >= end_seconds {
            return Ok(());
        }

        if scaler.is_none() {
            scaler = Some(ScalingContext::get(
                frame.format(),
                frame.width(),
                frame.height(),
                Pixel::RGB24,
                frame.width(),
                frame.height(),
                ScalingFlags::BILINEAR,
            )?);
        }
        if let Some(context) = scaler.as_mut() {
            context.run(frame, &mut rgb_frame)?;
        }
        let image = frame_to_image(&rgb_frame)?;

        while next_target <= time && next_target < end_seconds {
            handler(next_target, &image)?;
            next_target += step;
        }
        Ok(())
    })
}
