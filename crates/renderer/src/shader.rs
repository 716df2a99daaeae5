//! CPU evaluation of the portal fragment program.
//!
//! Every function here mirrors a function in the GLSL source held by
//! [`crate::compile`], operation for operation and in `f32`, so the software
//! rasterizer and the tests see the same field the GPU draws. Keep the two in
//! sync when touching either.

use glam::{Vec2, Vec3, Vec4};

/// Skew factor for 2D simplex grids, `(sqrt(3) - 1) / 2`.
pub const K1: f32 = 0.366_025_404;
/// Unskew factor for 2D simplex grids, `(3 - sqrt(3)) / 6`.
pub const K2: f32 = 0.211_324_865;

/// Fixed dark purple the portal is tinted with.
pub const BASE_COLOR: Vec3 = Vec3::new(0.3, 0.0, 0.3);
/// Additive tint driven by the high-frequency noise octave.
pub const VARIATION_TINT: Vec3 = Vec3::new(0.1, 0.0, 0.2);

/// Outer and inner radius of the soft disc edge before distortion.
pub const MASK_OUTER: f32 = 0.5;
pub const MASK_INNER: f32 = 0.48;

/// Pseudo-random gradient for a lattice point, components in `[-1, 1)`.
pub fn hash2(p: Vec2) -> Vec2 {
    let q = Vec2::new(
        p.dot(Vec2::new(127.1, 311.7)),
        p.dot(Vec2::new(269.5, 183.3)),
    );
    let s = Vec2::new(q.x.sin(), q.y.sin()) * 43_758.547;
    Vec2::splat(-1.0) + 2.0 * fract(s)
}

/// 2D simplex-style gradient noise, roughly in `[-1, 1]`.
pub fn noise(p: Vec2) -> f32 {
    let i = (p + Vec2::splat((p.x + p.y) * K1)).floor();
    let a = p - i + Vec2::splat((i.x + i.y) * K2);
    let o = if a.x > a.y { Vec2::X } else { Vec2::Y };
    let b = a - o + Vec2::splat(K2);
    let c = a - Vec2::ONE + Vec2::splat(2.0 * K2);

    let h = (Vec3::splat(0.5) - Vec3::new(a.dot(a), b.dot(b), c.dot(c))).max(Vec3::ZERO);
    let n = h * h * h * h
        * Vec3::new(
            a.dot(hash2(i)),
            b.dot(hash2(i + o)),
            c.dot(hash2(i + Vec2::ONE)),
        );

    n.dot(Vec3::splat(70.0))
}

/// GLSL `smoothstep`, including the reversed-edge form the mask relies on.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Soft circular mask: 1 inside `MASK_INNER + distortion`, 0 beyond `MASK_OUTER + distortion`.
pub fn circle_mask(radius: f32, distortion: f32) -> f32 {
    smoothstep(MASK_OUTER + distortion, MASK_INNER + distortion, radius)
}

/// Slow brightness pulse applied to the colour blend weight.
pub fn pulse(time: f32) -> f32 {
    (time * 2.0).sin() * 0.05 + 0.95
}

/// Evaluates the fragment program for a surface coordinate centred on the
/// origin (`[-0.5, 0.5]` per axis). Returns `(rgb * mask, mask)`.
pub fn portal_fragment(centered: Vec2, time: f32) -> Vec4 {
    let distortion = noise(centered * 3.0 + Vec2::splat(time * 0.2)) * 0.2;
    let uv = centered + Vec2::splat(distortion);

    let radius = uv.length();

    let noise_value = noise(uv * 5.0 + Vec2::splat(time * 0.3)) * 0.5 + 0.5;
    let circle = circle_mask(radius, distortion);

    let mut color = BASE_COLOR.lerp(BASE_COLOR * 3.0, noise_value * pulse(time));
    color += VARIATION_TINT * noise(uv * 8.0 + Vec2::splat(time * 0.5));
    color *= circle;

    color.extend(circle)
}

/// Evaluates the fragment program for a mesh UV in `[0, 1]`.
pub fn shade_uv(uv: Vec2, time: f32) -> Vec4 {
    portal_fragment(uv - Vec2::splat(0.5), time)
}

fn fract(v: Vec2) -> Vec2 {
    v - v.floor()
}
