use crate::math::{Vec3, TAU};

/// Phase offsets of the three channels, a third of a turn apart.
const CHANNEL_PHASES: [f32; 3] = [0.0, 1.0 / 3.0, 2.0 / 3.0];

/// Cyclic hue ramp: three sine waves a third of a turn apart.
///
/// Periodic with period 1 in `t` for every `color_shift`; any real input is
/// accepted.
pub fn palette(t: f32, color_shift: f32) -> Vec3 {
    let channel = |phase: f32| 0.5 + 0.5 * (TAU * (t + phase + color_shift)).sin();
    Vec3::new(
        channel(CHANNEL_PHASES[0]),
        channel(CHANNEL_PHASES[1]),
        channel(CHANNEL_PHASES[2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3, tolerance: f32) -> bool {
        (a.x - b.x).abs() <= tolerance
            && (a.y - b.y).abs() <= tolerance
            && (a.z - b.z).abs() <= tolerance
    }

    #[test]
    fn palette_has_unit_period_for_any_shift() {
        for shift in [-3.7_f32, -0.05, 0.0, 0.25, 1.0, 12.5] {
            for step in 0..50 {
                let t = step as f32 * 0.137 - 2.0;
                let a = palette(t, shift);
                let b = palette(t + 1.0, shift);
                assert!(close(a, b, 1e-4), "t={t} shift={shift}: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn palette_stays_within_unit_cube() {
        for step in 0..200 {
            let c = palette(step as f32 * 0.031, step as f32 * -0.07);
            for v in [c.x, c.y, c.z] {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn shifting_by_a_whole_turn_is_identity() {
        let a = palette(0.3, 0.0);
        let b = palette(0.3, 1.0);
        assert!(close(a, b, 1e-5));
    }
}
