//! Internal utility functions.
//!
//! Helpers for pixel-data copying and timestamp conversion shared by the
//! decoding and encoding modules.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::RgbImage;

use crate::error::ReelcutError;

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel for the frame format
/// (3 for RGB24).
pub fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert an RGB24 video frame to an [`RgbImage`].
pub fn frame_to_image(rgb_frame: &VideoFrame) -> Result<RgbImage, ReelcutError> {
    let width = rgb_frame.width();
    let height = rgb_frame.height();
    let buffer = frame_to_buffer(rgb_frame, width, height, 3);
    RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ReelcutError::DecodeFailure(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })
}

/// Copy an [`RgbImage`] into an RGB24 video frame, honouring the frame's
/// row stride.
pub fn image_to_frame(image: &RgbImage) -> VideoFrame {
    let width = image.width();
    let height = image.height();
    let mut frame = VideoFrame::new(ffmpeg_next::format::Pixel::RGB24, width, height);
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let source = image.as_raw();
    let destination = frame.data_mut(0);
    for y in 0..height as usize {
        let source_start = y * row_len;
        let destination_start = y * stride;
        destination[destination_start..destination_start + row_len]
            .copy_from_slice(&source[source_start..source_start + row_len]);
    }
    frame
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert a [`Duration`] to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `input_context.seek()` (via `avformat_seek_file` with `stream_index = -1`)
/// expects timestamps in AV_TIME_BASE (1/1_000_000).
pub fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    duration.as_micros() as i64
}

/// Read packed native-endian `f32` samples out of a raw audio plane.
pub fn bytes_to_samples(data: &[u8], sample_count: usize) -> impl Iterator<Item = f32> + '_ {
    data[..sample_count * 4]
        .chunks_exact(4)
        .map(|bytes| f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_to_seconds_uses_time_base() {
        let seconds = pts_to_seconds(90_000, Rational::new(1, 90_000));
        assert!((seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn seek_timestamp_is_microseconds() {
        assert_eq!(
            duration_to_seek_timestamp(Duration::from_millis(1500)),
            1_500_000
        );
    }

    #[test]
    fn bytes_to_samples_round_trips_values() {
        let values = [0.5f32, -0.25, 1.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let decoded: Vec<f32> = bytes_to_samples(&bytes, 3).collect();
        assert_eq!(decoded, values);
    }
}
