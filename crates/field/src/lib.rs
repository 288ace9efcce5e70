//! Procedural tunnel field evaluator.
//!
//! Each pixel is mapped to an aspect-corrected coordinate, marched through a
//! signed-distance tube, and composed into an RGB color in `[0, 1]`. The
//! evaluation is a pure function of the pixel, the frame context, the user
//! parameters and the [`Style`]; it never fails, substituting defined values
//! for degenerate inputs instead.

pub mod compose;
pub mod math;
pub mod noise;
pub mod palette;
mod params;
pub mod style;
pub mod tunnel;

pub use math::{Vec2, Vec3};
pub use params::{Parameter, ParameterSet, UnknownParameter};
pub use style::{Style, StyleError};
pub use tunnel::MarchSummary;

/// Resolution substituted when the surface reports a zero or negative size.
pub const FALLBACK_RESOLUTION: Resolution = Resolution::new(1280.0, 720.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub width: f32,
    pub height: f32,
}

impl Resolution {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// This resolution, or [`FALLBACK_RESOLUTION`] when either axis is not a
    /// positive finite number.
    pub fn effective(self) -> Self {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if usable(self.width) && usable(self.height) {
            self
        } else {
            FALLBACK_RESOLUTION
        }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Per-frame values recomputed by the session loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Seconds since the session started.
    pub time: f32,
    pub resolution: Resolution,
}

impl FrameContext {
    pub fn new(time: f32, resolution: impl Into<Resolution>) -> Self {
        Self {
            time,
            resolution: resolution.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [quantize(self.r), quantize(self.g), quantize(self.b), 255]
    }
}

impl From<Vec3> for Rgb {
    fn from(v: Vec3) -> Self {
        Self {
            r: v.x,
            g: v.y,
            b: v.z,
        }
    }
}

/// Full result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shade {
    pub color: Rgb,
    /// Fog factor in `[0, 1]`; 1 means no fog.
    pub depth: f32,
    pub march: MarchSummary,
}

/// Maps a pixel position (bottom-left origin) to the aspect-corrected
/// coordinate, dividing by the shorter axis.
pub fn normalize_pixel(pixel: Vec2, resolution: Resolution) -> Vec2 {
    let res = resolution.effective();
    let short = res.width.min(res.height);
    Vec2::new(
        (2.0 * pixel.x - res.width) / short,
        (2.0 * pixel.y - res.height) / short,
    )
}

pub fn shade(pixel: Vec2, frame: &FrameContext, params: &ParameterSet, style: Style) -> Shade {
    let res = frame.resolution.effective();
    let coord = normalize_pixel(pixel, res);
    let uv = Vec2::new(pixel.x / res.width, pixel.y / res.height);

    let camera = tunnel::camera(coord, frame.time, params, style);
    let march = tunnel::march(camera.ray, frame.time, params, style);
    let color = compose::compose(
        &compose::Fragment {
            coord,
            uv,
            camera: &camera,
            march: &march,
            time: frame.time,
        },
        params,
        style,
    );

    Shade {
        color: color.into(),
        depth: compose::depth_factor(march.fog_distance),
        march,
    }
}

/// Color of one pixel for one frame.
pub fn evaluate(pixel: Vec2, frame: &FrameContext, params: &ParameterSet, style: Style) -> Rgb {
    shade(pixel, frame, params, style).color
}
