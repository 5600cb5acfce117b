//! Effect Pipeline Tests
//!
//! Tests for:
//! - Frame flow: pass order, state machine, history ping-pong
//! - Scene input errors: missing buffers, size mismatches, stale outputs
//! - Compile failures: disabled effects, hot-reload re-enable, unresolvable
//!   texture names
//! - Quality: tier changes reach the live programs
//! - Host controls: resize, uniforms, composited history

use glam::{Vec3, Vec4};

use arena_ssfx::camera::Camera;
use arena_ssfx::passes::common::encode_normal;
use arena_ssfx::pipeline::{EffectPipeline, PassStatus, PipelineState, SceneBuffers};
use arena_ssfx::settings::PipelineSettings;
use arena_ssfx::shaders::{EffectKind, Uniform, builtin_source};
use arena_ssfx::targets::{RenderTarget, TargetName};
use arena_ssfx::{PerformanceSample, ShadowPrecision, SsfxError, Texture};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

const WIDTH: u32 = 32;
const HEIGHT: u32 = 32;

const BROKEN: &str = "struct Params { near: f32 \nfn main( {";

// ============================================================================
// Helpers
// ============================================================================

struct Frame {
    camera: Camera,
    color: Texture,
    depth: Texture,
    normal: Texture,
}

impl Frame {
    /// A full-screen plane at view distance 5 with the given normal.
    fn plane(normal: Vec3, color: Vec4) -> Self {
        let camera = Camera::perspective(60.0, WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);
        let depth = Texture::filled(
            "depth",
            WIDTH,
            HEIGHT,
            wgpu::TextureFormat::R32Float,
            Vec4::splat(camera.depth_from_linear(5.0)),
        );
        let normal = Texture::filled(
            "normal",
            WIDTH,
            HEIGHT,
            wgpu::TextureFormat::Rgba16Float,
            encode_normal(normal),
        );
        let color = Texture::filled("color", WIDTH, HEIGHT, wgpu::TextureFormat::Rgba16Float, color);
        Self {
            camera,
            color,
            depth,
            normal,
        }
    }

    /// Normals pointing away from the camera: every sample lands behind the
    /// surface, so SSAO reports occlusion.
    fn occluded() -> Self {
        Self::plane(-Vec3::Z, Vec4::new(0.2, 0.4, 0.8, 1.0))
    }

    fn facing() -> Self {
        Self::plane(Vec3::Z, Vec4::new(0.9, 0.9, 0.9, 1.0))
    }

    fn buffers(&self) -> SceneBuffers<'_> {
        SceneBuffers::new(&self.color, &self.depth, &self.normal)
    }
}

fn pipeline() -> EffectPipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    EffectPipeline::new(PipelineSettings::default(), WIDTH, HEIGHT).unwrap()
}

fn center() -> (u32, u32) {
    (WIDTH / 2, HEIGHT / 2)
}

fn texel(target: &RenderTarget, x: u32, y: u32) -> Vec4 {
    target.read().unwrap().load(x, y)
}

fn texels(target: &RenderTarget) -> Vec<Vec4> {
    target.read().unwrap().texels().to_vec()
}

// ============================================================================
// Frame Flow Tests
// ============================================================================

#[test]
fn new_pipeline_compiles_every_effect() {
    let pipeline = pipeline();
    assert!(!pipeline.is_device(), "new() runs the host passes");
    for effect in EffectKind::ALL {
        assert!(
            pipeline.registry().program_for(effect).is_some(),
            "{effect} program missing"
        );
        assert!(!pipeline.registry().is_disabled(effect));
    }
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(pipeline.active_tier().name, "broadcast");
    assert_eq!(pipeline.shadow_precision(), ShadowPrecision::High);
}

#[test]
fn passes_run_ssao_then_ssr_then_gi() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();

    let report = pipeline.render(&frame.camera, &frame.buffers());

    let order: Vec<EffectKind> = report.order().collect();
    assert_eq!(order, [EffectKind::Ssao, EffectKind::Ssr, EffectKind::Gi]);
    assert!(report.scene_error.is_none());
    for effect in EffectKind::ALL {
        assert!(report.is_fresh(effect), "{effect} was not rendered");
    }
    assert_eq!(report.frame, 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn gi_alpha_carries_this_frames_ssao() {
    let mut pipeline = pipeline();
    let frame = Frame::occluded();

    pipeline.render(&frame.camera, &frame.buffers());

    let outputs = pipeline.outputs();
    let ssao = outputs.ssao.read().unwrap();
    let gi = outputs.gi.read().unwrap();
    let (cx, cy) = center();
    assert!(
        ssao.load(cx, cy).x < 0.99,
        "Back-facing plane must be occluded"
    );

    for y in 0..gi.height() {
        for x in 0..gi.width() {
            let uv = gi.texel_uv(x, y);
            let ao = ssao.sample(uv).x;
            assert!(
                approx(gi.load(x, y).w, ao),
                "GI alpha at ({x}, {y}) is not the SSAO value"
            );
        }
    }
}

#[test]
fn gi_output_is_half_resolution() {
    let pipeline = pipeline();
    let outputs = pipeline.outputs();
    assert_eq!(outputs.gi.width(), WIDTH / 2);
    assert_eq!(outputs.gi.height(), HEIGHT / 2);
    assert_eq!(outputs.ssr.width(), WIDTH);
}

#[test]
fn history_holds_the_previous_color() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();

    pipeline.render(&frame.camera, &frame.buffers());

    assert_eq!(
        texel(pipeline.targets().target(TargetName::History), 3, 7),
        Vec4::new(0.9, 0.9, 0.9, 1.0)
    );
}

#[test]
fn submit_composited_overrides_history() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();
    pipeline.render(&frame.camera, &frame.buffers());

    let composited = Texture::filled(
        "final",
        WIDTH,
        HEIGHT,
        wgpu::TextureFormat::Rgba16Float,
        Vec4::new(0.1, 0.2, 0.3, 1.0),
    );
    pipeline.submit_composited(&composited).unwrap();

    assert_eq!(
        texel(pipeline.targets().target(TargetName::History), 0, 0),
        Vec4::new(0.1, 0.2, 0.3, 1.0)
    );

    let wrong = Texture::new("final", 8, 8, wgpu::TextureFormat::Rgba16Float);
    assert!(pipeline.submit_composited(&wrong).is_err());
}

#[test]
fn frame_index_advances_per_render() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();
    for expected in 1..=3 {
        let report = pipeline.render(&frame.camera, &frame.buffers());
        assert_eq!(report.frame, expected);
    }
    assert_eq!(pipeline.frame_index(), 3);
}

// ============================================================================
// Scene Input Error Tests
// ============================================================================

#[test]
fn missing_normal_buffer_skips_every_pass() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();
    let scene = SceneBuffers {
        color: Some(&frame.color),
        depth: Some(&frame.depth),
        normal: None,
        motion: None,
    };

    let report = pipeline.render(&frame.camera, &scene);

    assert!(matches!(
        report.scene_error,
        Some(SsfxError::MissingSceneBuffer(TargetName::Normal))
    ));
    for effect in EffectKind::ALL {
        assert!(matches!(report.status(effect), Some(PassStatus::Skipped)));
    }
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn skipped_frame_keeps_previous_outputs() {
    let mut pipeline = pipeline();
    let good = Frame::occluded();
    pipeline.render(&good.camera, &good.buffers());
    let ssao_before = texels(pipeline.outputs().ssao);
    let gi_before = texels(pipeline.outputs().gi);

    let report = pipeline.render(&good.camera, &SceneBuffers::default());

    assert!(report.scene_error.is_some());
    assert_eq!(texels(pipeline.outputs().ssao), ssao_before);
    assert_eq!(texels(pipeline.outputs().gi), gi_before);
}

#[test]
fn mismatched_buffer_is_rejected_before_any_upload() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();
    let small_depth = Texture::filled(
        "depth",
        WIDTH / 2,
        HEIGHT,
        wgpu::TextureFormat::R32Float,
        Vec4::splat(0.5),
    );
    let scene = SceneBuffers::new(&frame.color, &small_depth, &frame.normal);

    let report = pipeline.render(&frame.camera, &scene);

    assert!(matches!(
        report.scene_error,
        Some(SsfxError::SceneBufferSizeMismatch {
            target: TargetName::Depth,
            actual_width: 16,
            expected_width: 32,
            ..
        })
    ));
    // Colour is validated first but must not have been uploaded.
    assert_eq!(
        texel(pipeline.targets().target(TargetName::Color), 0, 0),
        Vec4::ZERO
    );
}

#[test]
fn optional_motion_buffer_is_uploaded() {
    let mut pipeline = pipeline();
    let frame = Frame::facing();
    let motion = Texture::filled(
        "motion",
        WIDTH,
        HEIGHT,
        wgpu::TextureFormat::Rg16Float,
        Vec4::new(0.01, -0.02, 0.0, 0.0),
    );
    let scene = frame.buffers().with_motion(&motion);

    let report = pipeline.render(&frame.camera, &scene);

    assert!(report.scene_error.is_none());
    assert_eq!(
        texel(pipeline.targets().target(TargetName::Motion), 5, 5),
        Vec4::new(0.01, -0.02, 0.0, 0.0)
    );
}

// ============================================================================
// Compile Failure Tests
// ============================================================================

#[test]
fn failed_compile_disables_only_that_effect() {
    let mut pipeline = pipeline();
    let occluded = Frame::occluded();
    pipeline.render(&occluded.camera, &occluded.buffers());
    let ssao_before = texels(pipeline.outputs().ssao);

    let err = pipeline.compile_program(EffectKind::Ssao, BROKEN).unwrap_err();
    assert!(matches!(
        err,
        SsfxError::ShaderCompile {
            effect: EffectKind::Ssao,
            ..
        }
    ));

    let facing = Frame::facing();
    let report = pipeline.render(&facing.camera, &facing.buffers());

    assert!(matches!(
        report.status(EffectKind::Ssao),
        Some(PassStatus::Disabled)
    ));
    assert!(report.is_fresh(EffectKind::Ssr));
    assert!(report.is_fresh(EffectKind::Gi));
    assert_eq!(
        texels(pipeline.outputs().ssao),
        ssao_before,
        "Disabled effect must keep its last output"
    );
}

#[test]
fn unresolvable_texture_name_disables_instead_of_panicking() {
    let mut pipeline = pipeline();
    let source = builtin_source(EffectKind::Ssr)
        .unwrap()
        .replace("color_map", "scene_color");

    let err = pipeline.compile_program(EffectKind::Ssr, &source).unwrap_err();
    match err {
        SsfxError::ShaderCompile { effect, diagnostic } => {
            assert_eq!(effect, EffectKind::Ssr);
            assert!(
                diagnostic.contains("scene_color"),
                "Diagnostic should name the texture: {diagnostic}"
            );
        }
        other => panic!("Expected ShaderCompile, got {other:?}"),
    }
    assert!(pipeline.registry().is_disabled(EffectKind::Ssr));

    let frame = Frame::facing();
    let report = pipeline.render(&frame.camera, &frame.buffers());
    assert!(matches!(
        report.status(EffectKind::Ssr),
        Some(PassStatus::Disabled)
    ));
    assert!(report.is_fresh(EffectKind::Ssao));
    assert!(report.is_fresh(EffectKind::Gi));
}

#[test]
fn successful_recompile_re_enables_the_effect() {
    let mut pipeline = pipeline();
    assert!(pipeline.compile_program(EffectKind::Ssr, BROKEN).is_err());
    assert!(pipeline.registry().is_disabled(EffectKind::Ssr));
    assert!(matches!(
        pipeline.set_uniform(EffectKind::Ssr, Uniform::SsrIntensity, 0.5_f32),
        Err(SsfxError::EffectDisabled(EffectKind::Ssr))
    ));

    let source = builtin_source(EffectKind::Ssr).unwrap();
    pipeline.compile_program(EffectKind::Ssr, &source).unwrap();

    assert!(!pipeline.registry().is_disabled(EffectKind::Ssr));
    let program = pipeline.registry().program_for(EffectKind::Ssr).unwrap();
    assert_eq!(
        program.u32(Uniform::SsrSteps).unwrap(),
        32,
        "Recompiled program must receive the active tier"
    );

    let frame = Frame::facing();
    let report = pipeline.render(&frame.camera, &frame.buffers());
    assert!(report.is_fresh(EffectKind::Ssr));
}

// ============================================================================
// Quality Tests
// ============================================================================

#[test]
fn tier_change_reaches_live_programs() {
    let mut pipeline = pipeline();

    assert!(pipeline.end_frame(PerformanceSample::new(30.0, 0.0)).is_none());
    let change = pipeline
        .end_frame(PerformanceSample::new(30.0, 2000.0))
        .expect("slow frames must lower the tier");
    assert_eq!(change.to, 1);

    let registry = pipeline.registry();
    let ssr = registry.program_for(EffectKind::Ssr).unwrap();
    let ssao = registry.program_for(EffectKind::Ssao).unwrap();
    let gi = registry.program_for(EffectKind::Gi).unwrap();
    assert_eq!(ssr.u32(Uniform::SsrSteps).unwrap(), 16);
    assert_eq!(ssr.u32(Uniform::SsrBinarySteps).unwrap(), 4);
    assert_eq!(ssao.u32(Uniform::SsaoSamples).unwrap(), 8);
    assert_eq!(gi.u32(Uniform::GiSamples).unwrap(), 4);
    assert_eq!(pipeline.shadow_precision(), ShadowPrecision::Medium);
}

#[test]
fn adaptive_off_holds_the_tier() {
    let mut pipeline = pipeline();
    pipeline.set_adaptive(false);

    pipeline.end_frame(PerformanceSample::new(50.0, 0.0));
    assert!(pipeline.end_frame(PerformanceSample::new(50.0, 5000.0)).is_none());
    assert_eq!(pipeline.active_tier().name, "broadcast");
}

#[test]
fn force_tier_applies_immediately() {
    let mut pipeline = pipeline();
    pipeline.force_tier("cinematic").unwrap();

    let gi = pipeline.registry().program_for(EffectKind::Gi).unwrap();
    assert_eq!(gi.u32(Uniform::GiSamples).unwrap(), 16);
    assert!(pipeline.force_tier("nonexistent").is_err());
}

// ============================================================================
// Host Control Tests
// ============================================================================

#[test]
fn resize_to_same_size_does_not_reallocate() {
    let mut pipeline = pipeline();
    let allocations = pipeline.targets().total_allocations();

    assert!(!pipeline.on_resize(WIDTH, HEIGHT).unwrap());
    assert!(!pipeline.on_resize(WIDTH, HEIGHT).unwrap());
    assert_eq!(pipeline.targets().total_allocations(), allocations);

    assert!(pipeline.on_resize(64, 48).unwrap());
    assert_eq!(pipeline.outputs().gi.width(), 32);
    assert_eq!(pipeline.outputs().gi.height(), 24);
}

#[test]
fn old_size_buffers_are_rejected_after_resize() {
    let mut pipeline = pipeline();
    pipeline.on_resize(64, 64).unwrap();
    let frame = Frame::facing();

    let report = pipeline.render(&frame.camera, &frame.buffers());
    assert!(matches!(
        report.scene_error,
        Some(SsfxError::SceneBufferSizeMismatch { .. })
    ));
}

#[test]
fn intensities_follow_uniform_updates() {
    let mut pipeline = pipeline();
    assert!(approx(pipeline.outputs().intensities.ssr, 1.0));

    pipeline
        .set_uniform(EffectKind::Ssr, Uniform::SsrIntensity, 0.25_f32)
        .unwrap();
    pipeline
        .set_uniform(EffectKind::Gi, Uniform::GiIntensity, 0.5_f32)
        .unwrap();

    let intensities = pipeline.outputs().intensities;
    assert!(approx(intensities.ssr, 0.25));
    assert!(approx(intensities.gi, 0.5));
    assert!(approx(intensities.ssao, 1.0));
}

#[test]
fn set_uniform_on_foreign_uniform_fails() {
    let mut pipeline = pipeline();
    let err = pipeline
        .set_uniform(EffectKind::Gi, Uniform::SsrThickness, 1.0_f32)
        .unwrap_err();
    assert!(
        matches!(err, SsfxError::UnknownUniform { effect: EffectKind::Gi, .. }),
        "Got {err:?}"
    );
}
