use crate::math::{mix, Vec2};

/// Deterministic 2D hash in `[0, 1)`.
///
/// Fractional multiplication followed by a self-dot perturbation. Purely for
/// visual decorrelation; it is not a cryptographic or well-distributed hash.
pub fn hash21(p: Vec2) -> f32 {
    let mut q = p.mul_elem(Vec2::new(123.34, 456.21)).fract();
    let d = q.dot(q + 45.32);
    q = q + d;
    crate::math::fract(q.x * q.y)
}

/// Smoothed value noise from the four corners of the unit cell containing `p`.
///
/// Corners are blended with the `3t² − 2t³` kernel, so the result is
/// continuous across cell boundaries.
pub fn value_noise(p: Vec2) -> f32 {
    let cell = p.floor();
    let local = p - cell;
    let f = Vec2::new(
        local.x * local.x * (3.0 - 2.0 * local.x),
        local.y * local.y * (3.0 - 2.0 * local.y),
    );

    let a = hash21(cell);
    let b = hash21(cell + Vec2::new(1.0, 0.0));
    let c = hash21(cell + Vec2::new(0.0, 1.0));
    let d = hash21(cell + Vec2::new(1.0, 1.0));

    mix(mix(a, b, f.x), mix(c, d, f.x), f.y)
}
