//! Vertical reframing.
//!
//! [`ReframePlan`] is the pure geometry: magnify by the zoom factor,
//! center-crop to the target ratio when the frame is wider than it, and
//! scale to the target height. [`Reframer`] applies a plan to decoded frames
//! through an FFmpeg filter graph (`crop` + `scale`), producing RGB images.
//!
//! Zoom, crop and scale collapse into one crop rectangle in source pixel
//! coordinates followed by one resample, so source pixels are never touched.
//!
//! # Example
//!
//! ```
//! use reelcut::{ReframeConfig, ReframePlan};
//!
//! let plan = ReframePlan::new(1920, 1080, &ReframeConfig::default()).unwrap();
//! assert_eq!(plan.output_height, 1920);
//! assert!(plan.output_width.abs_diff(1080) <= 2);
//! ```

use ffmpeg_next::{
    Rational, filter::Graph as FilterGraph, frame::Video as VideoFrame,
};
use ffmpeg_sys_next::AVPixelFormat;
use image::RgbImage;

use crate::{config::ReframeConfig, conversion::frame_to_image, error::ReelcutError};

/// A rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Crop and scale that bring one source size to the vertical canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReframePlan {
    /// Source frame width.
    pub source_width: u32,
    /// Source frame height.
    pub source_height: u32,
    /// Region of the source that survives the crop.
    pub crop: CropRect,
    /// Final frame width (even).
    pub output_width: u32,
    /// Final frame height (even).
    pub output_height: u32,
}

/// Round to the nearest even integer, never below 2.
fn round_even(value: f64) -> u32 {
    (((value / 2.0).round() * 2.0) as u32).max(2)
}

impl ReframePlan {
    /// Compute the plan for a `width` × `height` source.
    ///
    /// The frame is magnified by `config.zoom` first. When the magnified
    /// frame is wider than `config.target_ratio`, its width is cut to
    /// `floor(height · ratio)` around the center and the full height is
    /// kept. Narrower frames are not cropped. The result is scaled so its
    /// height equals `config.target_height`; both output dimensions are
    /// rounded to even numbers.
    ///
    /// # Errors
    ///
    /// [`ReelcutError::DecodeFailure`] for a zero-sized source or a
    /// non-positive zoom or ratio.
    pub fn new(width: u32, height: u32, config: &ReframeConfig) -> Result<Self, ReelcutError> {
        if width == 0 || height == 0 || config.zoom <= 0.0 || config.target_ratio <= 0.0 {
            return Err(ReelcutError::DecodeFailure(format!(
                "Cannot reframe a {width}x{height} frame (zoom={}, ratio={})",
                config.zoom, config.target_ratio
            )));
        }

        let zoomed_width = f64::from(width) * config.zoom;
        let zoomed_height = f64::from(height) * config.zoom;

        let (crop_width_zoomed, crop_x_zoomed) =
            if zoomed_width / zoomed_height > config.target_ratio {
                let cropped = (zoomed_height * config.target_ratio).floor();
                (cropped, (zoomed_width - cropped) / 2.0)
            } else {
                (zoomed_width, 0.0)
            };

        // Back to source pixels.
        let crop_width = ((crop_width_zoomed / config.zoom).round() as u32).clamp(1, width);
        let crop_x = ((crop_x_zoomed / config.zoom).round() as u32).min(width - crop_width);
        let crop = CropRect {
            x: crop_x,
            y: 0,
            width: crop_width,
            height,
        };

        let output_height = round_even(f64::from(config.target_height));
        let output_width =
            round_even(crop_width_zoomed / zoomed_height * f64::from(config.target_height));

        Ok(Self {
            source_width: width,
            source_height: height,
            crop,
            output_width,
            output_height,
        })
    }

    /// `true` when the plan removes part of the source.
    pub fn crops(&self) -> bool {
        self.crop.width != self.source_width || self.crop.height != self.source_height
    }

    /// Output width divided by output height.
    pub fn output_aspect_ratio(&self) -> f64 {
        f64::from(self.output_width) / f64::from(self.output_height)
    }

    /// FFmpeg filter chain implementing the plan, ending in RGB24.
    pub fn filter_spec(&self) -> String {
        let scale = format!(
            "scale={}:{}:flags=bicubic,format=pix_fmts=rgb24",
            self.output_width, self.output_height
        );
        if self.crops() {
            format!(
                "crop={}:{}:{}:{},{scale}",
                self.crop.width, self.crop.height, self.crop.x, self.crop.y
            )
        } else {
            scale
        }
    }
}

/// Applies a [`ReframePlan`] to decoded frames.
///
/// The filter graph is built from the first frame so its buffer source
/// matches the decoder's actual pixel format.
pub struct Reframer {
    plan: ReframePlan,
    time_base: Rational,
    graph: Option<FilterGraph>,
    filtered_frame: VideoFrame,
}

impl Reframer {
    /// Create a reframer for frames in `time_base`.
    pub fn new(plan: ReframePlan, time_base: Rational) -> Self {
        Self {
            plan,
            time_base,
            graph: None,
            filtered_frame: VideoFrame::empty(),
        }
    }

    /// The plan being applied.
    pub fn plan(&self) -> &ReframePlan {
        &self.plan
    }

    /// Reframe one decoded frame.
    pub fn apply(&mut self, frame: &VideoFrame) -> Result<RgbImage, ReelcutError> {
        if self.graph.is_none() {
            self.graph = Some(self.build_graph(frame)?);
        }
        let Some(graph) = self.graph.as_mut() else {
            return Err(ReelcutError::DecodeFailure(
                "Reframe filter graph unavailable".to_string(),
            ));
        };

        graph
            .get("in")
            .ok_or_else(|| ReelcutError::DecodeFailure("Filter 'in' not found".to_string()))?
            .source()
            .add(frame)
            .map_err(|e| ReelcutError::DecodeFailure(format!("Failed to feed filter: {e}")))?;

        graph
            .get("out")
            .ok_or_else(|| ReelcutError::DecodeFailure("Filter 'out' not found".to_string()))?
            .sink()
            .frame(&mut self.filtered_frame)
            .map_err(|e| ReelcutError::DecodeFailure(format!("Filter produced no frame: {e}")))?;

        frame_to_image(&self.filtered_frame)
    }

    fn build_graph(&self, frame: &VideoFrame) -> Result<FilterGraph, ReelcutError> {
        let pixel_format = AVPixelFormat::from(frame.format()) as i32;
        let mut graph = FilterGraph::new();

        let buffer_args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect=1/1",
            frame.width(),
            frame.height(),
            pixel_format,
            self.time_base.numerator(),
            self.time_base.denominator().max(1),
        );

        graph
            .add(
                &ffmpeg_next::filter::find("buffer").ok_or_else(|| {
                    ReelcutError::DecodeFailure("FFmpeg 'buffer' filter not found".to_string())
                })?,
                "in",
                &buffer_args,
            )
            .map_err(|e| {
                ReelcutError::DecodeFailure(format!("Failed to add buffer filter: {e}"))
            })?;

        graph
            .add(
                &ffmpeg_next::filter::find("buffersink").ok_or_else(|| {
                    ReelcutError::DecodeFailure("FFmpeg 'buffersink' filter not found".to_string())
                })?,
                "out",
                "",
            )
            .map_err(|e| {
                ReelcutError::DecodeFailure(format!("Failed to add buffersink filter: {e}"))
            })?;

        let spec = self.plan.filter_spec();
        log::debug!("Reframe filter: {spec}");
        graph
            .output("in", 0)
            .map_err(|e| ReelcutError::DecodeFailure(format!("Filter graph output error: {e}")))?
            .input("out", 0)
            .map_err(|e| ReelcutError::DecodeFailure(format!("Filter graph input error: {e}")))?
            .parse(&spec)
            .map_err(|e| ReelcutError::DecodeFailure(format!("Filter graph parse error: {e}")))?;

        graph
            .validate()
            .map_err(|e| ReelcutError::DecodeFailure(format!("Filter graph validation: {e}")))?;

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(width: u32, height: u32) -> ReframePlan {
        ReframePlan::new(width, height, &ReframeConfig::default()).unwrap()
    }

    #[test]
    fn landscape_is_center_cropped() {
        let plan = plan(1920, 1080);
        assert!(plan.crops());
        assert_eq!(plan.crop.height, 1080);
        assert_eq!(plan.crop.y, 0);
        // floor(1134 · 9/16) = 637 zoomed pixels, 606.7 source pixels.
        assert_eq!(plan.crop.width, 607);
        let left = plan.crop.x;
        let right = 1920 - plan.crop.x - plan.crop.width;
        assert!(left.abs_diff(right) <= 1);
        assert_eq!(plan.output_height, 1920);
        assert!(plan.output_width.abs_diff(1080) <= 2);
    }

    #[test]
    fn output_ratio_is_nine_by_sixteen() {
        for (width, height) in [(1280, 720), (3840, 2160), (1440, 1080), (1080, 1080)] {
            let plan = plan(width, height);
            assert!(
                (plan.output_aspect_ratio() - 9.0 / 16.0).abs() < 0.003,
                "{width}x{height} -> {}x{}",
                plan.output_width,
                plan.output_height
            );
        }
    }

    #[test]
    fn exact_vertical_source_is_only_scaled() {
        let plan = plan(1080, 1920);
        assert!(!plan.crops());
        assert_eq!((plan.output_width, plan.output_height), (1080, 1920));
    }

    #[test]
    fn narrower_source_is_not_pillarboxed() {
        let plan = plan(720, 1920);
        assert!(!plan.crops());
        assert_eq!(plan.output_height, 1920);
        assert_eq!(plan.output_width, 720);
        assert!(plan.output_aspect_ratio() < 9.0 / 16.0);
    }

    #[test]
    fn output_dimensions_are_even() {
        let plan = plan(1001, 563);
        assert_eq!(plan.output_width % 2, 0);
        assert_eq!(plan.output_height % 2, 0);
    }

    #[test]
    fn filter_spec_lists_crop_then_scale() {
        let spec = plan(1920, 1080).filter_spec();
        assert!(spec.starts_with("crop=607:1080:"));
        assert!(spec.contains("scale="));
        assert!(spec.ends_with("format=pix_fmts=rgb24"));
        assert!(plan(1080, 1920).filter_spec().starts_with("scale=1080:1920"));
    }

    #[test]
    fn zero_sized_source_is_rejected() {
        assert!(ReframePlan::new(0, 1080, &ReframeConfig::default()).is_err());
    }
}
