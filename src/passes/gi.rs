//! Screen-Space Global Illumination
//!
//! One-bounce indirect light, evaluated at half resolution. Each pixel draws
//! `gi_samples` uniform hemisphere directions around its normal, projects
//! the point `gi_radius` along each, and gathers the **previous frame's**
//! colour there weighted by `max(0, n·dir)`:
//!
//! ```text
//! indirect = Σ history(uv_i) · max(0, n·dir_i) / N · gi_intensity · ao
//! ```
//!
//! The SSAO term is a hard multiplicative gate: a fully occluded pixel
//! returns zero before any history texel is read, so even non-finite history
//! cannot leak through. Alpha carries the AO value used.
//!
//! Sample directions come from a stateless PCG hash seeded with the pixel
//! coordinate, the frame time, and the sample index, so every sample and
//! every frame draws fresh numbers without any RNG state.

use glam::{Vec2, Vec3, Vec4};

use super::common::{
    camera_from_uniforms, decode_normal, fullscreen, is_background, on_screen, pcg_hash,
    random01, sample_seed, tbn_basis,
};
use super::{EffectPass, PassContext};
use crate::camera::Camera;
use crate::errors::Result;
use crate::shaders::{EffectKind, ShaderProgram, Uniform};
use crate::texture::Texture;

pub const DEPTH_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;
pub const HISTORY_SLOT: u32 = 2;
pub const SSAO_SLOT: u32 = 3;

/// Sample index reserved for the per-pixel basis rotation.
const ROTATION_SAMPLE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
pub struct GiParams {
    pub samples: u32,
    pub radius: f32,
    pub intensity: f32,
    pub time: f32,
}

impl GiParams {
    pub fn from_program(program: &ShaderProgram) -> Result<Self> {
        Ok(Self {
            samples: program.u32(Uniform::GiSamples)?,
            radius: program.f32(Uniform::GiRadius)?,
            intensity: program.f32(Uniform::GiIntensity)?,
            time: program.f32(Uniform::Time)?,
        })
    }
}

/// Uniform direction on the `+Z` hemisphere from two numbers in `[0, 1)`.
#[must_use]
pub fn hemisphere_direction(u1: f32, u2: f32) -> Vec3 {
    let r = (1.0 - u1 * u1).max(0.0).sqrt();
    let phi = std::f32::consts::TAU * u2;
    Vec3::new(r * phi.cos(), r * phi.sin(), u1)
}

/// Scene inputs of the GI gather.
pub struct GiInputs<'a> {
    pub depth: &'a Texture,
    pub normal: &'a Texture,
    pub history: &'a Texture,
    pub ssao: &'a Texture,
}

/// Indirect light for the `gi` pixel `(x, y)` whose centre is at `uv`.
#[must_use]
pub fn gather(
    camera: &Camera,
    params: &GiParams,
    inputs: &GiInputs,
    x: u32,
    y: u32,
    uv: Vec2,
) -> Vec4 {
    let d = inputs.depth.sample(uv).x;
    if is_background(d) {
        return Vec4::ZERO;
    }

    // Fully occluded pixels get no bounce light, whatever history holds.
    let ao = inputs.ssao.sample(uv).x;
    if ao <= 0.0 {
        return Vec4::ZERO;
    }

    let origin = camera.view_position(uv, d);
    let n = decode_normal(inputs.normal.sample(uv));

    let rotation_seed = sample_seed(x, y, params.time, ROTATION_SAMPLE);
    let rotation = Vec3::new(
        random01(rotation_seed) * 2.0 - 1.0,
        random01(pcg_hash(rotation_seed)) * 2.0 - 1.0,
        0.0,
    );
    let basis = tbn_basis(n, rotation);

    let count = params.samples.max(1);
    let mut bounce = Vec3::ZERO;
    for i in 0..count {
        let seed = sample_seed(x, y, params.time, i);
        let dir = basis * hemisphere_direction(random01(seed), random01(pcg_hash(seed)));

        let sample = origin + dir * params.radius;
        if sample.z >= -camera.near {
            continue;
        }
        let Some((sample_uv, _)) = camera.project(sample) else {
            continue;
        };
        if !on_screen(sample_uv) {
            continue;
        }

        let weight = n.dot(dir).max(0.0);
        bounce += inputs.history.sample(sample_uv).truncate() * weight;
    }

    let indirect = bounce / count as f32 * params.intensity * ao;
    indirect.extend(ao)
}

/// The GI effect pass.
pub struct GiPass;

impl EffectPass for GiPass {
    fn kind(&self) -> EffectKind {
        EffectKind::Gi
    }

    fn run(&self, ctx: &PassContext) -> Result<Vec<Vec4>> {
        let camera = camera_from_uniforms(ctx.program)?;
        let params = GiParams::from_program(ctx.program)?;
        let inputs = GiInputs {
            depth: ctx.texture(DEPTH_SLOT)?,
            normal: ctx.texture(NORMAL_SLOT)?,
            history: ctx.texture(HISTORY_SLOT)?,
            ssao: ctx.texture(SSAO_SLOT)?,
        };

        let out = ctx.output();
        Ok(fullscreen(out.width(), out.height(), |x, y, uv| {
            gather(&camera, &params, &inputs, x, y, uv)
        }))
    }
}
