use crate::math::{fract, mix, smoothstep, Vec2, Vec3};
use crate::noise::value_noise;
use crate::palette::palette;
use crate::tunnel::{Camera, MarchSummary};
use crate::{ParameterSet, Style};

const FOG_RATE: f32 = 0.018;
const FOG_COLOR: Vec3 = Vec3::new(0.015, 0.015, 0.02);
const GAMMA: f32 = 0.85;
const SMEAR_MIX: f32 = 0.12;
const RINGS_MIX: f32 = 0.65;
const RINGS_COOL: Vec3 = Vec3::new(0.12, 0.25, 0.9);
const RINGS_WARM: Vec3 = Vec3::new(0.95, 0.3, 0.1);

/// Inputs shared by every composition term for one pixel.
pub struct Fragment<'a> {
    /// Aspect-corrected coordinate before any style transform.
    pub coord: Vec2,
    /// Pixel position over resolution, in `[0, 1]`.
    pub uv: Vec2,
    pub camera: &'a Camera,
    pub march: &'a MarchSummary,
    pub time: f32,
}

pub fn depth_factor(fog_distance: f32) -> f32 {
    (-FOG_RATE * fog_distance).exp().clamp(0.0, 1.0)
}

/// Turns the march summary into the final display color.
pub fn compose(frag: &Fragment<'_>, params: &ParameterSet, style: Style) -> Vec3 {
    let time = frag.time;
    let shift = params.color_shift;
    let p = frag.camera.screen;
    let radius = p.length();
    let acc = frag.march.channels;
    let glow = frag.march.glow;

    let base = fract(time * 0.12 * params.warp + frag.march.distance * FOG_RATE);
    let intensity = |channel: f32| (channel * 0.55 + glow * 0.9).clamp(0.0, 3.0);
    let mut col = Vec3::new(
        palette(fract(base + acc.x * 0.08 + 0.01), shift).x * intensity(acc.x),
        palette(fract(base + acc.y * 0.06), shift).y * intensity(acc.y),
        palette(fract(base + acc.z * 0.04 - 0.01), shift).z * intensity(acc.z),
    );

    col += palette(base + 0.2, shift) * (0.15 * (0.5 + 0.5 * value_noise(p * 8.0 + time * 0.7)));

    let veins = 0.5 + 0.5 * (30.0 * radius - time * 3.2 + value_noise(p * 12.0)).sin();
    col += palette(base + 0.35, shift) * (0.12 * veins);

    let boost = smoothstep(0.7, 0.0, radius)
        * (1.0 + 0.8 * (time * 1.5).sin())
        * (0.5 + 0.8 * params.warp.clamp(0.0, 3.0));
    col += palette(base + 0.5, shift) * (0.25 * boost);

    if style.chromatic_streaks {
        col += motion_streaks(p, frag.camera.travel, params.warp);
    }

    if style.rings {
        col = col.mix(rings_field(p, time, params), RINGS_MIX);
    }

    if style.hammer {
        col = hammer_overlay(col, frag.coord, frag.camera.travel);
    }

    col = col * smoothstep(1.3, 0.18, radius);
    col = FOG_COLOR.mix(col, depth_factor(frag.march.fog_distance));

    if style.chromatic_streaks {
        let smear = value_noise(frag.uv * 10.0 + time * 0.3) * 0.02;
        col.x = mix(col.x, palette(fract(base + smear + 0.02), shift).x, SMEAR_MIX);
        col.z = mix(col.z, palette(fract(base - smear - 0.02), shift).z, SMEAR_MIX);
    }

    finish(col)
}

/// Bright angular streaks concentrated near the travel axis.
fn motion_streaks(p: Vec2, travel: f32, warp: f32) -> Vec3 {
    let angle = p.atan2();
    let streak = smoothstep(0.0, 0.3, 1.0 - (18.0 * (angle + 0.2 * travel)).sin().abs());
    let core = (1.0 - p.length() * 6.0).max(0.0).powi(3);
    Vec3::new(0.9, 0.95, 1.0) * (1.2 * core * streak * (0.5 + 0.8 * warp.clamp(0.0, 3.0)))
}

/// Concentric rings scrolling outward, crossed by angular stripes whose
/// phase is bent by `warp` and offset by `color_shift`.
pub fn rings_field(p: Vec2, time: f32, params: &ParameterSet) -> Vec3 {
    let z = time * params.speed.max(0.001);
    let radius = p.length();
    let mut angle = p.atan2();
    angle += params.warp * 0.25 * (2.0 * angle + 0.8 * z).sin();

    let rings = smoothstep(params.thickness, 0.0, (10.0 * radius - 0.7 * z).sin().abs());
    let stripes = 0.5 + 0.5 * (6.0 * angle + 1.1 * z + params.color_shift).sin();
    RINGS_COOL.mix(RINGS_WARM, stripes) * (0.45 + 0.55 * rings)
}

/// Long handle plus rectangular head, scaled as it swings toward the camera.
pub fn hammer_mask(uv: Vec2, travel: f32) -> f32 {
    let swing = crate::math::modulo(travel * 1.6, 8.0);
    let zpos = -fract(swing) * 2.0 + 0.4;
    let scale = mix(0.9, 0.25, (zpos + 1.0).clamp(0.0, 1.0));
    let p = uv * (1.0 / scale);

    let handle = smoothstep(0.02, 0.01, p.x.abs())
        * smoothstep(0.6, 0.3, (p.y - (0.3 - 0.8 * zpos)).abs());
    let head = p - Vec2::new(0.0, -0.15 - 0.5 * zpos);
    let head_rect = smoothstep(
        0.35 + 0.02 * scale,
        0.33 + 0.02 * scale,
        head.x.abs().max((head.y * 0.4).abs()),
    );
    let mask = (head_rect + handle * 0.7).clamp(0.0, 1.0);
    smoothstep(0.15, 0.0, 1.0 - mask)
}

fn hammer_overlay(col: Vec3, coord: Vec2, travel: f32) -> Vec3 {
    let mask = hammer_mask(coord.mul_elem(Vec2::new(1.0, 1.6)), travel);
    let metal = Vec3::new(0.15, 0.1, 0.05).mix(Vec3::new(1.0, 0.95, 0.9), 0.9);
    let lit = metal + Vec3::new(1.0, 0.9, 0.6) * (2.2 * mask);
    col.mix(lit, smoothstep(0.02, 0.6, mask))
}

/// Non-finite channels become 0, then clamp and gamma.
fn finish(col: Vec3) -> Vec3 {
    let sanitize = |v: f32| if v.is_finite() { v } else { 0.0 };
    Vec3::new(sanitize(col.x), sanitize(col.y), sanitize(col.z))
        .clamp(0.0, 1.0)
        .powf(GAMMA)
}
