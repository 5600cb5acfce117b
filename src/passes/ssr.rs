//! Screen-Space Reflections
//!
//! For every non-background pixel the view-space position is rebuilt from
//! depth, the view ray is reflected about the decoded normal, and the
//! reflected ray is marched through the depth buffer in
//! `ssr_max_distance / ssr_steps` increments.
//!
//! ```text
//!   origin ──step──step──step──┐ crossed scene depth (within thickness)
//!                              ▼
//!                       bisect [prev, pos] × ssr_binary_steps
//!                              ▼
//!        rgb = color(hit) × intensity    a = falloff × fresnel × edge fade
//! ```
//!
//! A ray misses when it leaves the frame, passes behind the near plane, or
//! points back toward the camera.

use glam::{Vec2, Vec3, Vec4};

use super::common::{
    camera_from_uniforms, decode_normal, fullscreen, is_background, on_screen, smoothstep,
};
use super::{EffectPass, PassContext};
use crate::camera::Camera;
use crate::errors::Result;
use crate::shaders::{EffectKind, ShaderProgram, Uniform};
use crate::texture::Texture;

pub const DEPTH_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;
pub const COLOR_SLOT: u32 = 2;

/// Tunables of one SSR evaluation, read from the program's uniform table.
#[derive(Debug, Clone, Copy)]
pub struct SsrParams {
    pub steps: u32,
    pub binary_steps: u32,
    pub max_distance: f32,
    pub thickness: f32,
    pub fresnel_power: f32,
    pub edge_fade: f32,
    pub intensity: f32,
}

impl SsrParams {
    pub fn from_program(program: &ShaderProgram) -> Result<Self> {
        Ok(Self {
            steps: program.u32(Uniform::SsrSteps)?,
            binary_steps: program.u32(Uniform::SsrBinarySteps)?,
            max_distance: program.f32(Uniform::SsrMaxDistance)?,
            thickness: program.f32(Uniform::SsrThickness)?,
            fresnel_power: program.f32(Uniform::SsrFresnelPower)?,
            edge_fade: program.f32(Uniform::SsrEdgeFade)?,
            intensity: program.f32(Uniform::SsrIntensity)?,
        })
    }
}

/// Screen-edge attenuation; 1 inside the frame, fading to 0 over `band`.
#[must_use]
pub fn edge_fade(uv: Vec2, band: f32) -> f32 {
    let band = band.max(1e-4);
    let fade = |t: f32| smoothstep(0.0, band, t) * smoothstep(0.0, band, 1.0 - t);
    fade(uv.x) * fade(uv.y)
}

/// Confidence (output alpha) of a reflection hit.
///
/// The product of a linear distance falloff, a Fresnel term
/// `(1 - n·v)^fresnel_power`, and the screen-edge fade at the hit.
#[must_use]
pub fn ssr_confidence(
    traveled: f32,
    max_distance: f32,
    n_dot_v: f32,
    fresnel_power: f32,
    hit_uv: Vec2,
    edge_band: f32,
) -> f32 {
    if max_distance <= 0.0 {
        return 0.0;
    }
    let falloff = (1.0 - traveled / max_distance).clamp(0.0, 1.0);
    let fresnel = (1.0 - n_dot_v).clamp(0.0, 1.0).powf(fresnel_power);
    falloff * fresnel * edge_fade(hit_uv, edge_band)
}

/// Linear (positive) view depth of the scene at `uv`.
fn scene_depth(camera: &Camera, depth: &Texture, uv: Vec2) -> f32 {
    -camera.view_position(uv, depth.sample(uv).x).z
}

fn project_uv(camera: &Camera, pos: Vec3) -> Option<Vec2> {
    camera.project(pos).map(|(uv, _)| uv)
}

/// Marches one reflected ray. Returns the refined hit position.
fn march(
    camera: &Camera,
    depth: &Texture,
    params: &SsrParams,
    origin: Vec3,
    dir: Vec3,
) -> Option<Vec3> {
    let steps = params.steps.max(1);
    let step_len = params.max_distance / steps as f32;

    let mut prev = origin;
    for i in 1..=steps {
        let pos = origin + dir * (step_len * i as f32);
        if pos.z >= -camera.near {
            return None;
        }
        let uv = project_uv(camera, pos)?;
        if !on_screen(uv) {
            return None;
        }

        let ray_depth = -pos.z;
        let scene = scene_depth(camera, depth, uv);
        if ray_depth >= scene && ray_depth - scene < params.thickness {
            return Some(refine(camera, depth, params.binary_steps, prev, pos));
        }
        prev = pos;
    }
    None
}

/// Bisects between the last point in front of the surface and the first
/// point behind it.
fn refine(camera: &Camera, depth: &Texture, iterations: u32, mut lo: Vec3, mut hi: Vec3) -> Vec3 {
    for _ in 0..iterations {
        let mid = (lo + hi) * 0.5;
        let behind =
            project_uv(camera, mid).is_some_and(|uv| -mid.z >= scene_depth(camera, depth, uv));
        if behind {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// SSR for a single pixel.
#[must_use]
pub fn trace(
    camera: &Camera,
    params: &SsrParams,
    depth: &Texture,
    normal: &Texture,
    color: &Texture,
    uv: Vec2,
) -> Vec4 {
    let d = depth.sample(uv).x;
    if is_background(d) {
        return Vec4::ZERO;
    }

    let origin = camera.view_position(uv, d);
    let n = decode_normal(normal.sample(uv));
    let view_dir = origin.normalize_or_zero();
    let ray_dir = view_dir.reflect(n);
    if ray_dir.z > 0.0 {
        return Vec4::ZERO;
    }

    let Some(hit) = march(camera, depth, params, origin, ray_dir) else {
        return Vec4::ZERO;
    };
    let Some(hit_uv) = project_uv(camera, hit) else {
        return Vec4::ZERO;
    };
    let hit_uv = hit_uv.clamp(Vec2::ZERO, Vec2::ONE);

    let confidence = ssr_confidence(
        origin.distance(hit),
        params.max_distance,
        (-view_dir).dot(n),
        params.fresnel_power,
        hit_uv,
        params.edge_fade,
    );
    let reflected = color.sample(hit_uv).truncate() * params.intensity;
    reflected.extend(confidence)
}

/// The SSR effect pass.
pub struct SsrPass;

impl EffectPass for SsrPass {
    fn kind(&self) -> EffectKind {
        EffectKind::Ssr
    }

    fn run(&self, ctx: &PassContext) -> Result<Vec<Vec4>> {
        let camera = camera_from_uniforms(ctx.program)?;
        let params = SsrParams::from_program(ctx.program)?;
        let depth = ctx.texture(DEPTH_SLOT)?;
        let normal = ctx.texture(NORMAL_SLOT)?;
        let color = ctx.texture(COLOR_SLOT)?;

        let out = ctx.output();
        Ok(fullscreen(out.width(), out.height(), |_, _, uv| {
            trace(&camera, &params, depth, normal, color, uv)
        }))
    }
}
