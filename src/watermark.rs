//! Animated logo overlay.
//!
//! The logo is sized from the clip's own aspect ratio: clips whose ratio lies
//! strictly inside the compact range (vertical video) get the small logo,
//! anything else the large one. The logo sits inside a transparent padded
//! box flush with the right edge of the frame and bobs vertically with
//! `sin(t)`.
//!
//! # Example
//!
//! ```no_run
//! use image::RgbImage;
//! use reelcut::{ReelcutError, WatermarkCompositor, WatermarkConfig, WatermarkSpec};
//!
//! let config = WatermarkConfig::new("logo.png");
//! let spec = WatermarkSpec::for_clip(1080, 1920, &config);
//! let compositor = WatermarkCompositor::load(&config.logo_path, spec)?;
//! let mut frame = RgbImage::new(1080, 1920);
//! compositor.overlay(&mut frame, 0.5);
//! # Ok::<(), ReelcutError>(())
//! ```

use std::path::Path;

use image::{Rgb, RgbImage, RgbaImage, imageops::FilterType};

use crate::{config::WatermarkConfig, error::ReelcutError};

/// Logo height as a fraction of clip height for a clip of aspect `ratio`.
///
/// The compact range is open: its bounds themselves get the default scale.
pub fn logo_scale(ratio: f64, config: &WatermarkConfig) -> f64 {
    let (low, high) = config.compact_ratio_range;
    if ratio > low && ratio < high {
        config.compact_scale
    } else {
        config.default_scale
    }
}

/// Resolved watermark geometry for one clip size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkSpec {
    /// Clip width the geometry was derived for.
    pub clip_width: u32,
    /// Clip height the geometry was derived for.
    pub clip_height: u32,
    /// Selected scale factor.
    pub scale: f64,
    /// Logo height in pixels, `trunc(clip_height · scale)`.
    pub logo_height: u32,
    /// Transparent padding right of the logo.
    pub margin_right: u32,
    /// Transparent padding below the logo.
    pub margin_bottom: u32,
    /// Resting top of the padded box as a fraction of clip height.
    pub vertical_anchor: f64,
    /// Bob amplitude in pixels.
    pub bob_amplitude: f64,
}

impl WatermarkSpec {
    /// Derive the geometry for a `width` × `height` clip.
    pub fn for_clip(width: u32, height: u32, config: &WatermarkConfig) -> Self {
        let ratio = if height == 0 {
            0.0
        } else {
            f64::from(width) / f64::from(height)
        };
        let scale = logo_scale(ratio, config);
        Self {
            clip_width: width,
            clip_height: height,
            scale,
            logo_height: (f64::from(height) * scale) as u32,
            margin_right: config.margin_right,
            margin_bottom: config.margin_bottom,
            vertical_anchor: config.vertical_anchor,
            bob_amplitude: config.bob_amplitude,
        }
    }

    /// Top of the padded box at playback time `t` seconds.
    pub fn top_at(&self, t: f64) -> i64 {
        (self.vertical_anchor * f64::from(self.clip_height) + self.bob_amplitude * t.sin()) as i64
    }
}

/// Overlays a prepared logo onto frames.
///
/// Holds the logo already resized for one [`WatermarkSpec`]; it is loaded
/// once per render and never modified.
#[derive(Debug, Clone)]
pub struct WatermarkCompositor {
    spec: WatermarkSpec,
    logo: RgbaImage,
}

impl WatermarkCompositor {
    /// Load the logo at `path` and size it for `spec`.
    ///
    /// # Errors
    ///
    /// [`ReelcutError::AssetMissing`] if the file is absent or not a
    /// decodable image.
    pub fn load<P: AsRef<Path>>(path: P, spec: WatermarkSpec) -> Result<Self, ReelcutError> {
        let path = path.as_ref();
        let logo = image::open(path)
            .map_err(|error| ReelcutError::AssetMissing {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?
            .to_rgba8();
        log::debug!(
            "Loaded logo {} ({}x{}), target height {} px",
            path.display(),
            logo.width(),
            logo.height(),
            spec.logo_height
        );
        Ok(Self::new(&logo, spec))
    }

    /// Size an in-memory logo for `spec`, preserving its aspect ratio.
    pub fn new(logo: &RgbaImage, spec: WatermarkSpec) -> Self {
        let logo = if logo.height() == 0 || logo.width() == 0 || spec.logo_height == 0 {
            RgbaImage::new(0, 0)
        } else if logo.height() == spec.logo_height {
            logo.clone()
        } else {
            let width = (f64::from(logo.width()) * f64::from(spec.logo_height)
                / f64::from(logo.height()))
            .round()
            .max(1.0) as u32;
            image::imageops::resize(logo, width, spec.logo_height, FilterType::Lanczos3)
        };
        Self { spec, logo }
    }

    /// The geometry in use.
    pub fn spec(&self) -> &WatermarkSpec {
        &self.spec
    }

    /// Size of the resized logo.
    pub fn logo_dimensions(&self) -> (u32, u32) {
        self.logo.dimensions()
    }

    /// Top-left corner of the logo at playback time `t`.
    ///
    /// The padded box (`logo + margins`) is flush with the right edge, so
    /// the logo ends `margin_right` pixels before it.
    pub fn position(&self, t: f64) -> (i64, i64) {
        let box_width = i64::from(self.logo.width()) + i64::from(self.spec.margin_right);
        let x = i64::from(self.spec.clip_width) - box_width;
        (x, self.spec.top_at(t))
    }

    /// Alpha-blend the logo onto `frame` at playback time `t`, clipping to
    /// the frame bounds.
    pub fn overlay(&self, frame: &mut RgbImage, t: f64) {
        if self.logo.width() == 0 || self.logo.height() == 0 {
            return;
        }
        let (origin_x, origin_y) = self.position(t);
        let frame_width = i64::from(frame.width());
        let frame_height = i64::from(frame.height());

        for (logo_x, logo_y, pixel) in self.logo.enumerate_pixels() {
            let x = origin_x + i64::from(logo_x);
            let y = origin_y + i64::from(logo_y);
            if x < 0 || y < 0 || x >= frame_width || y >= frame_height {
                continue;
            }
            let alpha = u32::from(pixel.0[3]);
            if alpha == 0 {
                continue;
            }
            let base = frame.get_pixel_mut(x as u32, y as u32);
            *base = blend(*base, [pixel.0[0], pixel.0[1], pixel.0[2]], alpha);
        }
    }
}

fn blend(base: Rgb<u8>, over: [u8; 3], alpha: u32) -> Rgb<u8> {
    let inverse = 255 - alpha;
    let mix = |b: u8, o: u8| ((u32::from(o) * alpha + u32::from(b) * inverse + 127) / 255) as u8;
    Rgb([
        mix(base.0[0], over[0]),
        mix(base.0[1], over[1]),
        mix(base.0[2], over[2]),
    ])
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn config() -> WatermarkConfig {
        WatermarkConfig::new("logo.png")
    }

    #[test]
    fn scale_follows_the_clip_ratio() {
        let config = config();
        assert_eq!(logo_scale(0.5625, &config), 0.08);
        assert_eq!(logo_scale(0.60, &config), 0.08);
        assert_eq!(logo_scale(0.50, &config), 0.13);
        assert_eq!(logo_scale(1.0, &config), 0.13);
        assert_eq!(logo_scale(16.0 / 9.0, &config), 0.13);
    }

    #[test]
    fn scale_bounds_are_exclusive() {
        let config = config();
        assert_eq!(logo_scale(0.55, &config), 0.13);
        assert_eq!(logo_scale(0.65, &config), 0.13);
    }

    #[test]
    fn vertical_clip_gets_compact_logo() {
        let spec = WatermarkSpec::for_clip(1080, 1920, &config());
        assert_eq!(spec.scale, 0.08);
        assert_eq!(spec.logo_height, 153);
    }

    #[test]
    fn bob_stays_within_amplitude() {
        let spec = WatermarkSpec::for_clip(1080, 1920, &config());
        let rest = (0.92 * 1920.0) as i64;
        assert_eq!(spec.top_at(0.0), rest);
        for step in 0..200 {
            let top = spec.top_at(f64::from(step) * 0.05);
            assert!((top - rest).abs() <= 3, "top {top} at step {step}");
        }
        assert_eq!(spec.top_at(std::f64::consts::FRAC_PI_2), rest + 3);
    }

    #[test]
    fn logo_is_resized_preserving_aspect() {
        let logo = RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]));
        let spec = WatermarkSpec::for_clip(1080, 1920, &config());
        let compositor = WatermarkCompositor::new(&logo, spec);
        assert_eq!(compositor.logo_dimensions(), (306, 153));
    }

    #[test]
    fn logo_sits_margin_right_from_the_edge() {
        let logo = RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255]));
        let spec = WatermarkSpec {
            logo_height: 10,
            ..WatermarkSpec::for_clip(100, 200, &config())
        };
        let compositor = WatermarkCompositor::new(&logo, spec);
        let (x, _) = compositor.position(0.0);
        assert_eq!(x + 20 + 30, 100);
    }

    #[test]
    fn overlay_blends_and_clips() {
        let logo = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 128]));
        let spec = WatermarkSpec {
            logo_height: 2,
            ..WatermarkSpec::for_clip(40, 20, &config())
        };
        let compositor = WatermarkCompositor::new(&logo, spec);
        let mut frame = RgbImage::new(40, 20);
        compositor.overlay(&mut frame, 0.0);

        let (x, y) = compositor.position(0.0);
        assert_eq!((x, y), (6, 18));
        assert_eq!(frame.get_pixel(6, 18).0, [128, 128, 128]);
        assert_eq!(frame.get_pixel(9, 19).0, [128, 128, 128]);
        assert_eq!(frame.get_pixel(5, 18).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(10, 18).0, [0, 0, 0]);
    }

    #[test]
    fn transparent_pixels_leave_the_frame_untouched() {
        let logo = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 0]));
        let spec = WatermarkSpec {
            logo_height: 4,
            ..WatermarkSpec::for_clip(40, 20, &config())
        };
        let compositor = WatermarkCompositor::new(&logo, spec);
        let mut frame = RgbImage::from_pixel(40, 20, Rgb([9, 9, 9]));
        compositor.overlay(&mut frame, 1.0);
        assert!(frame.pixels().all(|p| p.0 == [9, 9, 9]));
    }

    #[test]
    fn missing_logo_is_an_asset_error() {
        let spec = WatermarkSpec::for_clip(1080, 1920, &config());
        let result = WatermarkCompositor::load("/nonexistent/logo.png", spec);
        assert!(matches!(result, Err(ReelcutError::AssetMissing { .. })));
    }
}
