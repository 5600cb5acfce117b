//! Screen-Space Ambient Occlusion
//!
//! # Algorithm
//!
//! 1. A hemisphere sample kernel (up to 64 samples) with importance-weighted
//!    distribution concentrated near the origin
//! 2. A 4×4 tiled rotation noise tile that randomizes the kernel orientation
//!    per-pixel, breaking banding while keeping the sample count low
//! 3. Range-checked occlusion: a sample counts only when the occluder lies
//!    within roughly one radius of the surface, so disconnected foreground
//!    objects do not cast halos
//!
//! Output is visibility `clamp((1 - occluded / N) ^ intensity, 0, 1)` in
//! every channel, alpha 1. Background pixels are fully visible.

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::common::{
    camera_from_uniforms, decode_normal, fullscreen, is_background, on_screen, smoothstep,
    tbn_basis,
};
use super::{EffectPass, PassContext};
use crate::camera::Camera;
use crate::errors::Result;
use crate::quality::MAX_SSAO_SAMPLES;
use crate::shaders::{EffectKind, NOISE_TILE_TEXELS, ShaderProgram, Uniform};
use crate::texture::Texture;

pub const DEPTH_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;

/// Floor of the pre-exponent visibility; keeps `pow` defined for negative
/// intensities. Matches the WGSL.
const MIN_VISIBILITY: f32 = 1e-6;

/// Tunables of one SSAO evaluation.
#[derive(Debug, Clone)]
pub struct SsaoParams<'a> {
    pub samples: u32,
    pub radius: f32,
    pub bias: f32,
    pub intensity: f32,
    pub kernel: &'a [Vec4],
    pub noise: &'a [Vec4],
}

impl<'a> SsaoParams<'a> {
    pub fn from_program(program: &'a ShaderProgram) -> Result<Self> {
        Ok(Self {
            samples: program.u32(Uniform::SsaoSamples)?,
            radius: program.f32(Uniform::SsaoRadius)?,
            bias: program.f32(Uniform::SsaoBias)?,
            intensity: program.f32(Uniform::SsaoIntensity)?,
            kernel: program.vec4_array(Uniform::SsaoKernel)?,
            noise: program.vec4_array(Uniform::SsaoNoise)?,
        })
    }

    fn sample_count(&self) -> usize {
        (self.samples.clamp(1, MAX_SSAO_SAMPLES) as usize).min(self.kernel.len().max(1))
    }
}

/// Generates a hemisphere sample kernel for SSAO.
///
/// Samples are distributed in the positive-Z hemisphere with a quadratic
/// falloff (more samples closer to the origin for better contact occlusion).
/// Seeded, so every run produces the same kernel.
#[must_use]
pub fn generate_ssao_kernel(samples: u32) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut kernel = Vec::with_capacity(samples as usize);

    for i in 0..samples {
        let mut sample = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(0.01..1.0),
        )
        .normalize();

        sample *= rng.random_range(0.0..1.0f32);

        // Quadratic scale: nearby occlusion matters most
        let scale = i as f32 / samples as f32;
        let scale = lerp(0.1, 1.0, scale * scale);
        sample *= scale;

        kernel.push(sample.extend(0.0));
    }
    kernel
}

/// Generates the 4×4 rotation tile.
///
/// Each entry is a unit rotation vector in XY (Z = 0), indexed by
/// `(y % 4) * 4 + (x % 4)`.
#[must_use]
pub fn generate_ssao_noise() -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..NOISE_TILE_TEXELS)
        .map(|_| {
            Vec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.0)
                .normalize_or(Vec3::X)
                .extend(0.0)
        })
        .collect()
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + f * (b - a)
}

#[inline]
fn noise_index(x: u32, y: u32) -> usize {
    ((y % 4) * 4 + (x % 4)) as usize
}

/// Visibility for a single pixel.
#[must_use]
pub fn occlusion(
    camera: &Camera,
    params: &SsaoParams,
    depth: &Texture,
    normal: &Texture,
    x: u32,
    y: u32,
) -> f32 {
    let uv = depth.texel_uv(x, y);
    let d = depth.sample(uv).x;
    if is_background(d) {
        return 1.0;
    }

    let origin = camera.view_position(uv, d);
    let n = decode_normal(normal.sample(uv));
    let rotation = params
        .noise
        .get(noise_index(x, y))
        .map_or(Vec3::X, |v| v.truncate());
    let basis = tbn_basis(n, rotation);

    let count = params.sample_count();
    let mut occluded = 0.0;
    for k in params.kernel.iter().take(count) {
        let sample = origin + basis * k.truncate() * params.radius;
        if sample.z >= -camera.near {
            continue;
        }
        let Some((sample_uv, _)) = camera.project(sample) else {
            continue;
        };
        if !on_screen(sample_uv) {
            continue;
        }

        let scene_z = camera.view_position(sample_uv, depth.sample(sample_uv).x).z;
        let range = params.radius / (origin.z - scene_z).abs().max(1e-4);
        let range_check = smoothstep(0.0, 1.0, range);
        if scene_z >= sample.z + params.bias {
            occluded += range_check;
        }
    }

    // Clamp after the exponent.
    (1.0 - occluded / count as f32)
        .max(MIN_VISIBILITY)
        .powf(params.intensity)
        .clamp(0.0, 1.0)
}

/// The SSAO effect pass.
pub struct SsaoPass;

impl EffectPass for SsaoPass {
    fn kind(&self) -> EffectKind {
        EffectKind::Ssao
    }

    fn run(&self, ctx: &PassContext) -> Result<Vec<Vec4>> {
        let camera = camera_from_uniforms(ctx.program)?;
        let params = SsaoParams::from_program(ctx.program)?;
        let depth = ctx.texture(DEPTH_SLOT)?;
        let normal = ctx.texture(NORMAL_SLOT)?;

        let out = ctx.output();
        Ok(fullscreen(out.width(), out.height(), |x, y, _| {
            let v = occlusion(&camera, &params, depth, normal, x, y);
            Vec4::new(v, v, v, 1.0)
        }))
    }
}
