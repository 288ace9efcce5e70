//! Camera setup, the tunnel distance proxy and the accumulating ray march.

use crate::math::{ease_in_out, modulo, smoothstep, Vec2, Vec3, PI, TAU};
use crate::noise::value_noise;
use crate::{ParameterSet, Style};

pub const MAX_STEPS: u32 = 140;
pub const MAX_DISTANCE: f32 = 200.0;
pub const MIN_STEP: f32 = 0.015;
const STEP_SCALE: f32 = 0.45;
const HIT_FALLOFF: f32 = 24.0;
const Z_PERIOD: f32 = 2.0 * TAU;

const SEGMENT_LENGTH: f32 = 6.0;
const BOW_AMPLITUDE: f32 = 2.4;
const PATH_DAMPING: f32 = 0.12;

/// Signed distance proxy for the undulating tube around the z axis.
///
/// Not a true metric distance: the march only relies on its sign and rough
/// magnitude.
pub fn tunnel_distance(pos: Vec3, time: f32) -> f32 {
    let r = pos.xy().length();
    let wave = 0.35 * (6.0 * pos.z + 2.0 * (3.0 * pos.z + time * 0.6).sin()).sin();
    let rings = 0.22 * (40.0 * (r + 0.6 * (2.0 * pos.z + time).sin())).sin();
    r - (1.0 + wave + rings)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// A pixel after style transforms, ready to be marched and composed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub ray: Ray,
    /// Transformed screen coordinate used by the screen-space decor terms.
    pub screen: Vec2,
    /// Travel depth `time * speed`.
    pub travel: f32,
}

/// Builds the view ray for an aspect-corrected coordinate.
pub fn camera(coord: Vec2, time: f32, params: &ParameterSet, style: Style) -> Camera {
    let travel = time * params.speed;
    let mut p = coord;
    let mut origin_xy = Vec2::ZERO;

    if style.drift {
        let center = drift_center(time, params.warp);
        p = p - center * 0.6;
        let r = p.length();
        let strength = 0.8 / (0.5 + r) * params.warp;
        let angle = time * 0.8 + 2.0 * (time * 0.4 + r * 6.0).sin();
        p = p.rotate(angle * strength);
        origin_xy = center * 2.0;
    }

    if style.corner_path {
        let center = corner_center(travel);
        p = p - center;
        origin_xy = origin_xy + center;
    }

    if style.banking {
        p = p.rotate(0.9 * (0.9 * travel).sin());
    }

    let direction = Vec3::new(p.x, p.y, -1.6 + 0.5 * (time * 0.2).sin()).normalize();
    Camera {
        ray: Ray {
            origin: Vec3::new(origin_xy.x, origin_xy.y, travel),
            direction,
        },
        screen: p,
        travel,
    }
}

/// Oscillating tube center with a little noise jitter, scaled by warp.
fn drift_center(time: f32, warp: f32) -> Vec2 {
    let sway = Vec2::new((time * 0.6).sin() * 0.35, (time * 0.4).cos() * 0.25) * (0.5 + 0.5 * warp);
    let jitter = Vec2::new(
        value_noise(Vec2::new(time * 0.7, 0.0)),
        value_noise(Vec2::new(0.0, time * 0.9)),
    ) * 0.08;
    sway + jitter
}

/// Path center that travels along one cardinal direction per segment and
/// bows sideways through each eased turn.
pub fn corner_center(travel: f32) -> Vec2 {
    let segment = (travel / SEGMENT_LENGTH).floor();
    let progress = crate::math::fract(travel / SEGMENT_LENGTH);
    let dir = match modulo(segment, 4.0) as u32 {
        0 => Vec2::new(1.0, 0.0),
        1 => Vec2::new(0.0, 1.0),
        2 => Vec2::new(-1.0, 0.0),
        _ => Vec2::new(0.0, -1.0),
    };
    let bow = ease_in_out(progress);
    let center = dir * (progress * SEGMENT_LENGTH * 0.75)
        + dir.perp() * (BOW_AMPLITUDE * (PI * bow).sin() * smoothstep(0.0, 1.0, bow));
    center * PATH_DAMPING
}

/// Accumulated march results consumed by composition.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarchSummary {
    /// Per-channel layer sums.
    pub channels: Vec3,
    pub glow: f32,
    /// Total distance travelled when the march stopped.
    pub distance: f32,
    /// Hit-weighted mean distance, the input to fog.
    pub fog_distance: f32,
    pub steps: u32,
}

pub fn march(ray: Ray, time: f32, params: &ParameterSet, style: Style) -> MarchSummary {
    let mut channels = Vec3::splat(0.0);
    let mut glow = 0.0;
    let mut coverage = 0.0;
    let mut weighted = 0.0;
    let mut t = 0.0;
    let mut steps = 0;

    for _ in 0..MAX_STEPS {
        steps += 1;
        let pos = ray.origin + ray.direction * t;
        let phase = if style.drift {
            10.0 * (time * 0.15 + pos.x * 0.07).sin()
        } else {
            0.0
        };
        let wrapped = Vec3::new(pos.x, pos.y, modulo(pos.z + phase, Z_PERIOD));

        let d = tunnel_distance(wrapped, time).abs();
        let hit = (-HIT_FALLOFF * d).exp();
        let n = value_noise(Vec2::new(
            pos.x * 1.6 + time * 0.6,
            pos.y * 1.6 - time * 0.4,
        ));
        let base = 0.5 + 0.5 * (10.0 * pos.z + 4.0 * n + time * 3.0).sin();
        let pulse = 0.6 + 0.4 * (pos.z * 3.0 + time * 4.0 + n * 6.0).sin();
        let layers = Vec3::new(
            1.0 + 0.2 * (time * 2.3 + pos.z * 2.0 + n * 3.0).sin(),
            1.0 + 0.2 * (time * 2.7 + pos.z * 2.2 + n * 2.5).sin(),
            1.0 + 0.2 * (time * 3.1 + pos.z * 2.4 + n * 2.0).sin(),
        ) * base;

        channels += layers * (hit * pulse);
        glow += hit * (1.0 - smoothstep(0.0, params.thickness, d));
        coverage += hit;
        weighted += hit * t;

        t += (STEP_SCALE * d).max(MIN_STEP);
        if t > MAX_DISTANCE {
            break;
        }
    }

    MarchSummary {
        channels,
        glow,
        distance: t,
        fog_distance: weighted / (coverage + 1.0),
        steps,
    }
}
