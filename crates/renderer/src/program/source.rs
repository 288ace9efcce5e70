use field::Style;

/// Entry point of the built-in full-screen triangle.
pub const VERTEX_ENTRY: &str = "vs_fullscreen";
/// Entry point of the built-in tunnel fragment stage.
pub const TUNNEL_FRAGMENT_ENTRY: &str = "fs_tunnel";
/// Name of the style bitmask constant every fragment unit carries.
pub const STYLE_CONSTANT: &str = "TUNNEL_STYLE";

/// Where a unit's code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceOrigin {
    /// Generated by this crate; the CPU device has a native kernel for it.
    Builtin,
    #[default]
    Custom,
}

/// One WGSL translation unit handed to [`crate::program::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: String,
    pub code: String,
    pub origin: SourceOrigin,
}

impl ProgramSource {
    pub fn new(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
            origin: SourceOrigin::Custom,
        }
    }

    fn builtin(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            origin: SourceOrigin::Builtin,
            ..Self::new(label, code)
        }
    }

    pub fn builtin_vertex() -> Self {
        Self::builtin("fullscreen vertex", VERTEX_SHADER_WGSL)
    }

    pub fn builtin_fragment(style: Style) -> Self {
        Self::builtin(
            format!("tunnel fragment ({style})"),
            wrap_fragment(TUNNEL_FRAGMENT_WGSL, style),
        )
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == SourceOrigin::Builtin
    }

    /// Wraps a user fragment body with the input block prelude.
    pub fn custom_fragment(label: impl Into<String>, body: &str, style: Style) -> Self {
        Self::new(label, wrap_fragment(body, style))
    }
}

/// Produces a self-contained fragment unit from a body.
///
/// Lines that redeclare the style constant are dropped so the prelude's value
/// wins; everything else is kept verbatim.
fn wrap_fragment(body: &str, style: Style) -> String {
    let mut sanitized = String::with_capacity(body.len());
    for line in body.lines() {
        if line.trim_start().starts_with(&format!("const {STYLE_CONSTANT}")) {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }
    format!(
        "{PRELUDE}\nconst {STYLE_CONSTANT}: u32 = {bits}u;\n\n{sanitized}",
        bits = style.bits()
    )
}

/// Input block and style flags shared by every fragment unit.
///
/// Member names are the slot names resolved at bind time.
const PRELUDE: &str = r"struct TunnelInputs {
    time: f32,
    speed: f32,
    resolution: vec2<f32>,
    warp: f32,
    thickness: f32,
    colorShift: f32,
}

@group(0) @binding(0)
var<uniform> inputs: TunnelInputs;

const STYLE_DRIFT: u32 = 1u;
const STYLE_CORNER_PATH: u32 = 2u;
const STYLE_BANKING: u32 = 4u;
const STYLE_CHROMATIC_STREAKS: u32 = 8u;
const STYLE_HAMMER: u32 = 16u;
const STYLE_RINGS: u32 = 32u;
";

const VERTEX_SHADER_WGSL: &str = r"struct VertexOutput {
    @builtin(position) position: vec4<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    var out: VertexOutput;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    return out;
}
";

/// The tunnel field. Mirrors `field::shade` term for term.
const TUNNEL_FRAGMENT_WGSL: &str = r"const TAU: f32 = 6.283185307;
const PI: f32 = 3.141592654;
const Z_PERIOD: f32 = 12.566370614;

fn has_style(bit: u32) -> bool {
    return (TUNNEL_STYLE & bit) != 0u;
}

fn fmod(x: f32, y: f32) -> f32 {
    if (y == 0.0) {
        return 0.0;
    }
    return x - y * floor(x / y);
}

fn sstep(e0: f32, e1: f32, x: f32) -> f32 {
    let span = e1 - e0;
    if (span == 0.0) {
        return select(1.0, 0.0, x < e0);
    }
    let t = clamp((x - e0) / span, 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn ease_in_out(t_in: f32) -> f32 {
    let t = clamp(t_in, 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn rotate2(v: vec2<f32>, a: f32) -> vec2<f32> {
    let s = sin(a);
    let c = cos(a);
    return vec2<f32>(c * v.x + s * v.y, -s * v.x + c * v.y);
}

fn hash21(p_in: vec2<f32>) -> f32 {
    var p = fract(p_in * vec2<f32>(123.34, 456.21));
    let d = dot(p, p + vec2<f32>(45.32));
    p = p + vec2<f32>(d);
    return fract(p.x * p.y);
}

fn value_noise(p: vec2<f32>) -> f32 {
    let cell = floor(p);
    let f = p - cell;
    let u = f * f * (vec2<f32>(3.0) - 2.0 * f);
    let a = hash21(cell);
    let b = hash21(cell + vec2<f32>(1.0, 0.0));
    let c = hash21(cell + vec2<f32>(0.0, 1.0));
    let d = hash21(cell + vec2<f32>(1.0, 1.0));
    return mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

fn palette(t: f32) -> vec3<f32> {
    let shift = inputs.colorShift;
    return vec3<f32>(
        0.5 + 0.5 * sin(TAU * (t + shift)),
        0.5 + 0.5 * sin(TAU * (t + 1.0 / 3.0 + shift)),
        0.5 + 0.5 * sin(TAU * (t + 2.0 / 3.0 + shift)),
    );
}

fn tunnel_distance(pos: vec3<f32>, time: f32) -> f32 {
    let r = length(pos.xy);
    let wave = 0.35 * sin(6.0 * pos.z + 2.0 * sin(3.0 * pos.z + time * 0.6));
    let rings = 0.22 * sin(40.0 * (r + 0.6 * sin(2.0 * pos.z + time)));
    return r - (1.0 + wave + rings);
}

fn drift_center(time: f32, warp: f32) -> vec2<f32> {
    let sway = vec2<f32>(sin(time * 0.6) * 0.35, cos(time * 0.4) * 0.25) * (0.5 + 0.5 * warp);
    let jitter = vec2<f32>(
        value_noise(vec2<f32>(time * 0.7, 0.0)),
        value_noise(vec2<f32>(0.0, time * 0.9)),
    ) * 0.08;
    return sway + jitter;
}

fn corner_center(travel: f32) -> vec2<f32> {
    let segment = floor(travel / 6.0);
    let progress = fract(travel / 6.0);
    let quadrant = u32(fmod(segment, 4.0));
    var dir = vec2<f32>(0.0, -1.0);
    if (quadrant == 0u) {
        dir = vec2<f32>(1.0, 0.0);
    } else if (quadrant == 1u) {
        dir = vec2<f32>(0.0, 1.0);
    } else if (quadrant == 2u) {
        dir = vec2<f32>(-1.0, 0.0);
    }
    let bow = ease_in_out(progress);
    let perp = vec2<f32>(-dir.y, dir.x);
    let center = dir * (progress * 6.0 * 0.75) + perp * (2.4 * sin(PI * bow) * sstep(0.0, 1.0, bow));
    return center * 0.12;
}

fn intensity(channel: f32, glow: f32) -> f32 {
    return clamp(channel * 0.55 + glow * 0.9, 0.0, 3.0);
}

fn motion_streaks(p: vec2<f32>, travel: f32, warp: f32) -> vec3<f32> {
    let angle = atan2(p.y, p.x);
    let streak = sstep(0.0, 0.3, 1.0 - abs(sin(18.0 * (angle + 0.2 * travel))));
    let falloff = max(1.0 - length(p) * 6.0, 0.0);
    let axis_glow = falloff * falloff * falloff;
    return vec3<f32>(0.9, 0.95, 1.0) * (1.2 * axis_glow * streak * (0.5 + 0.8 * clamp(warp, 0.0, 3.0)));
}

fn hammer_mask(uv: vec2<f32>, travel: f32) -> f32 {
    let swing = fmod(travel * 1.6, 8.0);
    let zpos = -fract(swing) * 2.0 + 0.4;
    let scale = mix(0.9, 0.25, clamp(zpos + 1.0, 0.0, 1.0));
    let p = uv * (1.0 / scale);
    let handle_mask = sstep(0.02, 0.01, abs(p.x)) * sstep(0.6, 0.3, abs(p.y - (0.3 - 0.8 * zpos)));
    let head = p - vec2<f32>(0.0, -0.15 - 0.5 * zpos);
    let head_rect = sstep(0.35 + 0.02 * scale, 0.33 + 0.02 * scale, max(abs(head.x), abs(head.y * 0.4)));
    let mask = clamp(head_rect + handle_mask * 0.7, 0.0, 1.0);
    return sstep(0.15, 0.0, 1.0 - mask);
}

fn hammer_overlay(col: vec3<f32>, coord: vec2<f32>, travel: f32) -> vec3<f32> {
    let mask = hammer_mask(coord * vec2<f32>(1.0, 1.6), travel);
    let metal = mix(vec3<f32>(0.15, 0.1, 0.05), vec3<f32>(1.0, 0.95, 0.9), vec3<f32>(0.9));
    let lit = metal + vec3<f32>(1.0, 0.9, 0.6) * (2.2 * mask);
    return mix(col, lit, vec3<f32>(sstep(0.02, 0.6, mask)));
}

fn rings_field(p: vec2<f32>, time: f32) -> vec3<f32> {
    let z = time * max(inputs.speed, 0.001);
    let radius = length(p);
    var angle = atan2(p.y, p.x);
    angle = angle + inputs.warp * 0.25 * sin(2.0 * angle + 0.8 * z);
    let rings = sstep(inputs.thickness, 0.0, abs(sin(10.0 * radius - 0.7 * z)));
    let stripes = 0.5 + 0.5 * sin(6.0 * angle + 1.1 * z + inputs.colorShift);
    let col = mix(vec3<f32>(0.12, 0.25, 0.9), vec3<f32>(0.95, 0.3, 0.1), vec3<f32>(stripes));
    return col * (0.45 + 0.55 * rings);
}

fn scrub_non_finite(col: vec3<f32>) -> vec3<f32> {
    let bad = (col != col) | (abs(col) > vec3<f32>(1e38));
    return select(col, vec3<f32>(0.0), bad);
}

@fragment
fn fs_tunnel(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    var res = inputs.resolution;
    if (!(res.x > 0.0 && res.y > 0.0)) {
        res = vec2<f32>(1280.0, 720.0);
    }
    let pixel = vec2<f32>(frag_coord.x, res.y - frag_coord.y);
    let coord = (2.0 * pixel - res) / min(res.x, res.y);
    let uv = pixel / res;
    let time = inputs.time;
    let warp = inputs.warp;
    let travel = time * inputs.speed;

    var p = coord;
    var origin_xy = vec2<f32>(0.0);
    if (has_style(STYLE_DRIFT)) {
        let center = drift_center(time, warp);
        p = p - center * 0.6;
        let r = length(p);
        let strength = 0.8 / (0.5 + r) * warp;
        let angle = time * 0.8 + 2.0 * sin(time * 0.4 + r * 6.0);
        p = rotate2(p, angle * strength);
        origin_xy = center * 2.0;
    }
    if (has_style(STYLE_CORNER_PATH)) {
        let center = corner_center(travel);
        p = p - center;
        origin_xy = origin_xy + center;
    }
    if (has_style(STYLE_BANKING)) {
        p = rotate2(p, 0.9 * sin(0.9 * travel));
    }
    let ro = vec3<f32>(origin_xy, travel);
    let rd = normalize(vec3<f32>(p, -1.6 + 0.5 * sin(time * 0.2)));

    var channels = vec3<f32>(0.0);
    var glow = 0.0;
    var coverage = 0.0;
    var weighted = 0.0;
    var t = 0.0;
    for (var i = 0u; i < 140u; i += 1u) {
        let pos = ro + rd * t;
        var phase = 0.0;
        if (has_style(STYLE_DRIFT)) {
            phase = 10.0 * sin(time * 0.15 + pos.x * 0.07);
        }
        let wrapped = vec3<f32>(pos.xy, fmod(pos.z + phase, Z_PERIOD));
        let d = abs(tunnel_distance(wrapped, time));
        let hit = exp(-24.0 * d);
        let n = value_noise(vec2<f32>(pos.x * 1.6 + time * 0.6, pos.y * 1.6 - time * 0.4));
        let layer = 0.5 + 0.5 * sin(10.0 * pos.z + 4.0 * n + time * 3.0);
        let pulse = 0.6 + 0.4 * sin(pos.z * 3.0 + time * 4.0 + n * 6.0);
        let layers = vec3<f32>(
            1.0 + 0.2 * sin(time * 2.3 + pos.z * 2.0 + n * 3.0),
            1.0 + 0.2 * sin(time * 2.7 + pos.z * 2.2 + n * 2.5),
            1.0 + 0.2 * sin(time * 3.1 + pos.z * 2.4 + n * 2.0),
        ) * layer;
        channels = channels + layers * (hit * pulse);
        glow = glow + hit * (1.0 - sstep(0.0, inputs.thickness, d));
        coverage = coverage + hit;
        weighted = weighted + hit * t;
        t = t + max(0.45 * d, 0.015);
        if (t > 200.0) {
            break;
        }
    }
    let fog_distance = weighted / (coverage + 1.0);

    let radius = length(p);
    let base = fract(time * 0.12 * warp + t * 0.018);
    var col = vec3<f32>(
        palette(fract(base + channels.x * 0.08 + 0.01)).x * intensity(channels.x, glow),
        palette(fract(base + channels.y * 0.06)).y * intensity(channels.y, glow),
        palette(fract(base + channels.z * 0.04 - 0.01)).z * intensity(channels.z, glow),
    );
    col = col + palette(base + 0.2) * (0.15 * (0.5 + 0.5 * value_noise(p * 8.0 + vec2<f32>(time * 0.7))));
    let veins = 0.5 + 0.5 * sin(30.0 * radius - time * 3.2 + value_noise(p * 12.0));
    col = col + palette(base + 0.35) * (0.12 * veins);
    let boost = sstep(0.7, 0.0, radius) * (1.0 + 0.8 * sin(time * 1.5)) * (0.5 + 0.8 * clamp(warp, 0.0, 3.0));
    col = col + palette(base + 0.5) * (0.25 * boost);

    if (has_style(STYLE_CHROMATIC_STREAKS)) {
        col = col + motion_streaks(p, travel, warp);
    }
    if (has_style(STYLE_RINGS)) {
        col = mix(col, rings_field(p, time), vec3<f32>(0.65));
    }
    if (has_style(STYLE_HAMMER)) {
        col = hammer_overlay(col, coord, travel);
    }

    col = col * sstep(1.3, 0.18, radius);
    let depth = clamp(exp(-0.018 * fog_distance), 0.0, 1.0);
    col = mix(vec3<f32>(0.015, 0.015, 0.02), col, vec3<f32>(depth));

    if (has_style(STYLE_CHROMATIC_STREAKS)) {
        let smear = value_noise(uv * 10.0 + vec2<f32>(time * 0.3)) * 0.02;
        col.x = mix(col.x, palette(fract(base + smear + 0.02)).x, 0.12);
        col.z = mix(col.z, palette(fract(base - smear - 0.02)).z, 0.12);
    }

    col = scrub_non_finite(col);
    col = pow(clamp(col, vec3<f32>(0.0), vec3<f32>(1.0)), vec3<f32>(0.85));
    return vec4<f32>(col, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_injects_prelude_and_style_bits() {
        let source = ProgramSource::builtin_fragment(Style::thor());
        assert!(source.code.starts_with("struct TunnelInputs"));
        assert!(source
            .code
            .contains(&format!("const TUNNEL_STYLE: u32 = {}u;", Style::thor().bits())));
        assert!(source.code.contains("fn fs_tunnel"));
        assert!(source.label.contains("thor"));
    }

    #[test]
    fn prelude_style_bits_match_style_flags() {
        let source = ProgramSource::builtin_fragment(Style::rings());
        for (name, style) in [
            ("STYLE_DRIFT", Style { drift: true, ..Style::classic() }),
            ("STYLE_CORNER_PATH", Style { corner_path: true, ..Style::classic() }),
            ("STYLE_BANKING", Style { banking: true, ..Style::classic() }),
            ("STYLE_CHROMATIC_STREAKS", Style { chromatic_streaks: true, ..Style::classic() }),
            ("STYLE_HAMMER", Style { hammer: true, ..Style::classic() }),
            ("STYLE_RINGS", Style::rings()),
        ] {
            let decl = format!("const {name}: u32 = {}u;", style.bits());
            assert!(source.code.contains(&decl), "missing {decl}");
        }
    }

    #[test]
    fn fragment_scrubs_non_finite_before_clamping() {
        let code = ProgramSource::builtin_fragment(Style::classic()).code;
        let scrub = code.find("col = scrub_non_finite(col);").unwrap();
        let clamp = code.find("clamp(col, vec3<f32>(0.0)").unwrap();
        assert!(scrub < clamp);
    }

    #[test]
    fn wrap_drops_redeclared_style_constant() {
        let body = "const TUNNEL_STYLE: u32 = 99u;\n@fragment\nfn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }\n";
        let source = ProgramSource::custom_fragment("custom", body, Style::classic());
        assert!(!source.code.contains("99u"));
        assert_eq!(source.code.matches("const TUNNEL_STYLE").count(), 1);
    }
}
