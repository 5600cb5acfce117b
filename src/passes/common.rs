//! Helpers shared by the effect kernels.
//!
//! These mirror `chunks/common.wgsl` one-for-one so the host kernels and the
//! WGSL programs agree on every convention: depth sentinel, normal encoding,
//! UV orientation, and the hemisphere basis.

use glam::{Mat3, Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::errors::Result;
use crate::shaders::{ShaderProgram, Uniform};

/// Depths at or beyond `1 - FAR_DEPTH_EPSILON` are background.
pub const FAR_DEPTH_EPSILON: f32 = 1e-6;

#[inline]
#[must_use]
pub fn is_background(depth: f32) -> bool {
    depth >= 1.0 - FAR_DEPTH_EPSILON
}

#[inline]
#[must_use]
pub fn on_screen(uv: Vec2) -> bool {
    (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y)
}

/// Packs a view-space normal into `[0, 1]` RGB.
#[inline]
#[must_use]
pub fn encode_normal(normal: Vec3) -> Vec4 {
    (normal.normalize_or(Vec3::Z) * 0.5 + Vec3::splat(0.5)).extend(1.0)
}

#[inline]
#[must_use]
pub fn decode_normal(encoded: Vec4) -> Vec3 {
    (encoded.truncate() * 2.0 - Vec3::ONE).normalize_or(Vec3::Z)
}

/// Hermite interpolation, WGSL `smoothstep` semantics.
#[inline]
#[must_use]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Gram-Schmidt frame around `normal`, rotated by `random_vec`.
///
/// Falls back to a fixed axis when `random_vec` is parallel to the normal.
#[must_use]
pub fn tbn_basis(normal: Vec3, random_vec: Vec3) -> Mat3 {
    let mut tangent = random_vec - normal * random_vec.dot(normal);
    if tangent.length_squared() < 1e-6 {
        let axis = if normal.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
        tangent = axis - normal * axis.dot(normal);
    }
    let tangent = tangent.normalize();
    let bitangent = normal.cross(tangent);
    Mat3::from_cols(tangent, bitangent, normal)
}

// ─── Hashing ──────────────────────────────────────────────────────────────────

/// PCG-style integer hash.
#[inline]
#[must_use]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Maps a hash to `[0, 1)` using its top 24 bits.
#[inline]
#[must_use]
pub fn random01(seed: u32) -> f32 {
    (pcg_hash(seed) >> 8) as f32 * 5.960_464_5e-8
}

/// Decorrelated seed for one sample of one pixel at one point in time.
#[inline]
#[must_use]
pub fn sample_seed(px: u32, py: u32, time: f32, sample_index: u32) -> u32 {
    pcg_hash(px ^ pcg_hash(py ^ pcg_hash(time.to_bits() ^ pcg_hash(sample_index))))
}

// ─── Frame Inputs ─────────────────────────────────────────────────────────────

/// Rebuilds the projection state from a program's frame uniforms.
///
/// Kernels go through this rather than the caller's [`Camera`] so that what
/// they compute always matches what the program would be given.
pub fn camera_from_uniforms(program: &ShaderProgram) -> Result<Camera> {
    Ok(Camera {
        projection_matrix: program.mat4(Uniform::Projection)?,
        inverse_projection_matrix: program.mat4(Uniform::InverseProjection)?,
        view_matrix: glam::Mat4::IDENTITY,
        near: program.f32(Uniform::Near)?,
        far: program.f32(Uniform::Far)?,
    })
}

/// Evaluates `shade` for every texel of a `width × height` output.
pub(crate) fn fullscreen(
    width: u32,
    height: u32,
    mut shade: impl FnMut(u32, u32, Vec2) -> Vec4,
) -> Vec<Vec4> {
    let size = Vec2::new(width as f32, height as f32);
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
            out.push(shade(x, y, uv));
        }
    }
    out
}
