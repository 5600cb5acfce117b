//! Pass Pipeline Orchestrator
//!
//! [`EffectPipeline`] owns the render targets, the program registry and the
//! adaptive controller, and runs the effect passes in a fixed order.
//!
//! # Frame Flow
//!
//! ```text
//!  render(camera, scene)
//!    │  Idle ─► Rendering
//!    ├─ validate + upload scene buffers ──✗──► skip every pass (stale outputs)
//!    ├─ frame uniforms (projection, resolution, near/far, time)
//!    ├─ SSAO ──► ssao
//!    ├─ SSR  ──► ssr
//!    ├─ GI   ──► gi          (reads history + this frame's ssao)
//!    ├─ color ─► history     (read by next frame's GI)
//!    │  Rendering ─► Idle
//!    ▼
//!  FrameReport               outputs() → ssr / ssao / gi + intensities
//!
//!  end_frame(sample) ──► controller ──(tier change)──► registry.apply_quality
//! ```
//!
//! # Backends
//!
//! [`EffectPipeline::with_device`] keeps every target on the GPU and records
//! SSAO, SSR, GI and the history copy into one command encoder per frame,
//! submitted once. [`EffectPipeline::new`] runs the host reference passes on
//! host targets; it needs no adapter and is what headless tests exercise.
//! Both backends share the registry, uniforms, controller and report.
//!
//! # Degradation
//!
//! Nothing in a frame aborts the frame. A pass whose program is disabled or
//! whose evaluation fails leaves its output target untouched, and invalid
//! scene input skips all passes. The compositor always gets three textures.

use glam::Vec4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::camera::Camera;
use crate::controller::{AdaptiveQualityController, PerformanceSample, TierChange};
use crate::errors::{Result, SsfxError};
use crate::gpu::{DevicePass, GpuContext};
use crate::passes::ssao::{generate_ssao_kernel, generate_ssao_noise};
use crate::passes::{EffectPass, GiPass, PassContext, SsaoPass, SsrPass};
use crate::quality::{MAX_SSAO_SAMPLES, QualityTier, ShadowPrecision};
use crate::settings::PipelineSettings;
use crate::shaders::{EffectKind, ProgramHandle, ShaderRegistry, Uniform, UniformValue};
use crate::targets::{RenderTarget, RenderTargetManager, TargetName};
use crate::texture::Texture;
use crate::utils::FrameTimer;

// ─── Frame Inputs / Outputs ───────────────────────────────────────────────────

/// Buffers produced upstream by the scene pass.
///
/// `color`, `depth` and `normal` are required; `motion` is optional.
#[derive(Default, Clone, Copy)]
pub struct SceneBuffers<'a> {
    pub color: Option<&'a Texture>,
    pub depth: Option<&'a Texture>,
    pub normal: Option<&'a Texture>,
    pub motion: Option<&'a Texture>,
}

impl<'a> SceneBuffers<'a> {
    #[must_use]
    pub fn new(color: &'a Texture, depth: &'a Texture, normal: &'a Texture) -> Self {
        Self {
            color: Some(color),
            depth: Some(depth),
            normal: Some(normal),
            motion: None,
        }
    }

    #[must_use]
    pub fn with_motion(mut self, motion: &'a Texture) -> Self {
        self.motion = Some(motion);
        self
    }

    fn required(&self) -> [(TargetName, Option<&'a Texture>); 3] {
        [
            (TargetName::Color, self.color),
            (TargetName::Depth, self.depth),
            (TargetName::Normal, self.normal),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rendering,
}

/// Blend weights the compositor applies to each effect texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectIntensities {
    pub ssr: f32,
    pub ssao: f32,
    pub gi: f32,
}

/// The three effect targets handed to the compositor.
///
/// On the GPU backend the compositor binds [`RenderTarget::view`];
/// [`RenderTarget::read`] copies a target back to the host on either backend.
pub struct EffectOutputs<'a> {
    pub ssr: &'a RenderTarget,
    pub ssao: &'a RenderTarget,
    pub gi: &'a RenderTarget,
    pub intensities: EffectIntensities,
}

/// What happened to one pass in one frame.
#[derive(Debug)]
pub enum PassStatus {
    /// Output was rewritten this frame.
    Rendered,
    /// Program failed to compile; output is stale.
    Disabled,
    /// Evaluation failed; output is stale.
    Failed(SsfxError),
    /// Scene input was invalid; output is stale.
    Skipped,
}

/// Per-frame outcome of [`EffectPipeline::render`].
#[derive(Debug)]
pub struct FrameReport {
    pub frame: u64,
    /// Why the whole frame's effects were skipped, if they were.
    pub scene_error: Option<SsfxError>,
    /// Pass outcomes in execution order.
    pub passes: SmallVec<[(EffectKind, PassStatus); 3]>,
}

impl FrameReport {
    fn new(frame: u64) -> Self {
        Self {
            frame,
            scene_error: None,
            passes: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn status(&self, effect: EffectKind) -> Option<&PassStatus> {
        self.passes
            .iter()
            .find(|(kind, _)| *kind == effect)
            .map(|(_, status)| status)
    }

    /// `true` when `effect`'s output was rewritten this frame.
    #[must_use]
    pub fn is_fresh(&self, effect: EffectKind) -> bool {
        matches!(self.status(effect), Some(PassStatus::Rendered))
    }

    /// Effects in the order they were evaluated.
    pub fn order(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.passes.iter().map(|(kind, _)| *kind)
    }
}

// ─── Orchestrator ─────────────────────────────────────────────────────────────

/// Fails fast in debug builds; logs and carries on in release builds.
fn programmer_error(err: &SsfxError) {
    if cfg!(debug_assertions) {
        panic!("{err}");
    }
    log::error!("{err}");
}

fn pass_for(effect: EffectKind) -> &'static dyn EffectPass {
    match effect {
        EffectKind::Ssr => &SsrPass,
        EffectKind::Ssao => &SsaoPass,
        EffectKind::Gi => &GiPass,
    }
}

enum Backend {
    Host,
    Device {
        gpu: GpuContext,
        passes: FxHashMap<EffectKind, DevicePass>,
    },
}

/// Records one effect's draw into the frame encoder.
fn encode_pass(
    registry: &ShaderRegistry,
    targets: &RenderTargetManager,
    gpu: &GpuContext,
    passes: &FxHashMap<EffectKind, DevicePass>,
    encoder: &mut wgpu::CommandEncoder,
    effect: EffectKind,
) -> PassStatus {
    if registry.is_disabled(effect) {
        return PassStatus::Disabled;
    }
    let (Some(program), Some(pass)) = (registry.program_for(effect), passes.get(&effect)) else {
        return PassStatus::Disabled;
    };
    match pass.encode(gpu, encoder, targets, program) {
        Ok(()) => PassStatus::Rendered,
        Err(err) => {
            log::warn!("{effect} pass failed, keeping previous output: {err}");
            PassStatus::Failed(err)
        }
    }
}

pub struct EffectPipeline {
    backend: Backend,
    settings: PipelineSettings,
    targets: RenderTargetManager,
    registry: ShaderRegistry,
    controller: AdaptiveQualityController,
    timer: FrameTimer,
    state: PipelineState,
    frame_index: u64,
}

impl EffectPipeline {
    /// Validates `settings`, allocates host targets and compiles the built-in
    /// effect programs for the host reference passes.
    ///
    /// An effect whose program fails to compile is disabled, not fatal.
    pub fn new(settings: PipelineSettings, width: u32, height: u32) -> Result<Self> {
        settings.validate()?;
        let targets = RenderTargetManager::new(width, height)?;
        Self::build(Backend::Host, settings, targets)
    }

    /// Like [`new`](Self::new), with every target and pass on the GPU.
    pub fn with_device(
        gpu: GpuContext,
        settings: PipelineSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        settings.validate()?;
        let targets = RenderTargetManager::with_device(gpu.clone(), width, height)?;
        let backend = Backend::Device {
            gpu,
            passes: FxHashMap::default(),
        };
        Self::build(backend, settings, targets)
    }

    fn build(
        backend: Backend,
        settings: PipelineSettings,
        targets: RenderTargetManager,
    ) -> Result<Self> {
        let controller = AdaptiveQualityController::from_settings(&settings)?;
        let size = targets.size();

        let mut pipeline = Self {
            backend,
            settings,
            targets,
            registry: ShaderRegistry::new(),
            controller,
            timer: FrameTimer::new(),
            state: PipelineState::Idle,
            frame_index: 0,
        };

        for effect in EffectKind::ALL {
            // Failures are logged and leave the effect disabled.
            if pipeline.registry.compile_builtin(effect).is_ok() {
                let _ = pipeline.configure(effect);
            }
        }

        log::info!(
            "Effect pipeline ready at {}x{} ({}), tier {}",
            size.x,
            size.y,
            if pipeline.is_device() { "GPU" } else { "host" },
            pipeline.controller.tier()
        );
        Ok(pipeline)
    }

    /// Replaces an effect's program with `source` (hot reload).
    ///
    /// On failure the effect is disabled until a later compile succeeds.
    /// This includes sources that parse but name a texture outside the
    /// target set, or that the device rejects.
    pub fn compile_program(&mut self, effect: EffectKind, source: &str) -> Result<ProgramHandle> {
        let handle = self.registry.compile(effect, source)?;
        self.configure(effect)?;
        Ok(handle)
    }

    /// Binds textures, pushes settings, kernel data and the active tier into
    /// a freshly compiled program, then builds its GPU pipeline.
    ///
    /// Any failure disables the effect.
    fn configure(&mut self, effect: EffectKind) -> Result<()> {
        let result = self.try_configure(effect);
        if let Err(err) = &result {
            self.registry.disable(effect, err);
            if let Backend::Device { passes, .. } = &mut self.backend {
                passes.remove(&effect);
            }
        }
        result
    }

    fn try_configure(&mut self, effect: EffectKind) -> Result<()> {
        let Some(handle) = self.registry.handle_for(effect) else {
            return Ok(());
        };

        let slots: SmallVec<[(u32, TargetName); 4]> =
            self.registry.program(handle)?.texture_targets().collect();
        for (slot, target) in slots {
            self.registry.bind_target(handle, slot, target)?;
        }

        let ssr = self.settings.ssr;
        let ssao = self.settings.ssao;
        let gi = self.settings.gi;
        let values: [(Uniform, UniformValue); 12] = [
            (Uniform::SsrMaxDistance, ssr.max_distance.into()),
            (Uniform::SsrThickness, ssr.thickness.into()),
            (Uniform::SsrFresnelPower, ssr.fresnel_power.into()),
            (Uniform::SsrEdgeFade, ssr.edge_fade.into()),
            (Uniform::SsrIntensity, ssr.intensity.into()),
            (Uniform::SsaoRadius, ssao.radius.into()),
            (Uniform::SsaoBias, ssao.bias.into()),
            (Uniform::SsaoIntensity, ssao.intensity.into()),
            (
                Uniform::SsaoKernel,
                UniformValue::Vec4Array(generate_ssao_kernel(MAX_SSAO_SAMPLES)),
            ),
            (
                Uniform::SsaoNoise,
                UniformValue::Vec4Array(generate_ssao_noise()),
            ),
            (Uniform::GiRadius, gi.radius.into()),
            (Uniform::GiIntensity, gi.intensity.into()),
        ];
        for (uniform, value) in values {
            self.registry.set_declared(handle, uniform, value)?;
        }

        self.registry.apply_quality(self.controller.tier());

        if let Backend::Device { gpu, passes } = &mut self.backend {
            let program = self.registry.program(handle)?;
            let stale = passes
                .get(&effect)
                .is_none_or(|pass| pass.source_hash() != program.source_hash());
            if stale {
                let pass = DevicePass::new(gpu, program, effect.output_target().format())?;
                passes.insert(effect, pass);
            }
        }
        Ok(())
    }

    // ── Frame ────────────────────────────────────────────────────────────────

    /// Runs every enabled pass for one frame.
    ///
    /// Never aborts: failures are reported in the returned [`FrameReport`]
    /// and the affected outputs keep their previous contents. Read the
    /// textures with [`outputs`](Self::outputs).
    pub fn render(&mut self, camera: &Camera, scene: &SceneBuffers) -> FrameReport {
        self.state = PipelineState::Rendering;
        self.frame_index += 1;
        self.timer.begin_frame();

        let mut report = FrameReport::new(self.frame_index);

        if let Err(err) = self.ingest(scene) {
            log::warn!("Frame {}: effects skipped: {err}", self.frame_index);
            for effect in EffectKind::ALL {
                report.passes.push((effect, PassStatus::Skipped));
            }
            report.scene_error = Some(err);
            self.state = PipelineState::Idle;
            return report;
        }

        self.update_frame_uniforms(camera);

        if self.is_device() {
            self.run_device(&mut report);
        } else {
            self.run_host(&mut report);
        }

        self.state = PipelineState::Idle;

        log::debug!("Frame {} done: {:?}", self.frame_index, report.passes);
        report
    }

    /// Validates every scene buffer before uploading any of them.
    fn ingest(&mut self, scene: &SceneBuffers) -> Result<()> {
        let mut buffers: SmallVec<[(TargetName, &Texture); 4]> = SmallVec::new();
        for (name, buffer) in scene.required() {
            buffers.push((name, buffer.ok_or(SsfxError::MissingSceneBuffer(name))?));
        }
        if let Some(motion) = scene.motion {
            buffers.push((TargetName::Motion, motion));
        }

        for (name, buffer) in &buffers {
            let target = self.targets.target(*name);
            if buffer.size() != target.size() {
                return Err(SsfxError::SceneBufferSizeMismatch {
                    target: *name,
                    actual_width: buffer.width(),
                    actual_height: buffer.height(),
                    expected_width: target.width(),
                    expected_height: target.height(),
                });
            }
        }

        for (name, buffer) in buffers {
            self.targets.upload(name, buffer)?;
        }
        Ok(())
    }

    fn update_frame_uniforms(&mut self, camera: &Camera) {
        let size = self.targets.size().as_vec2();
        let resolution = Vec4::new(size.x, size.y, 1.0 / size.x, 1.0 / size.y);
        let time = self.timer.seconds();

        for effect in EffectKind::ALL {
            let Some(handle) = self.registry.handle_for(effect) else {
                continue;
            };
            let values: [(Uniform, UniformValue); 7] = [
                (Uniform::Projection, camera.projection_matrix.into()),
                (
                    Uniform::InverseProjection,
                    camera.inverse_projection_matrix.into(),
                ),
                (Uniform::View, camera.view_matrix.into()),
                (Uniform::Resolution, resolution.into()),
                (Uniform::Near, camera.near.into()),
                (Uniform::Far, camera.far.into()),
                (Uniform::Time, time.into()),
            ];
            for (uniform, value) in values {
                if let Err(err) = self.registry.set_declared(handle, uniform, value) {
                    programmer_error(&err);
                }
            }
        }
    }

    /// Records every pass and the history copy into one encoder and submits
    /// it once.
    fn run_device(&self, report: &mut FrameReport) {
        let Backend::Device { gpu, passes } = &self.backend else {
            return;
        };
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Frame"),
            });
        for effect in EffectKind::ALL {
            let status = encode_pass(&self.registry, &self.targets, gpu, passes, &mut encoder, effect);
            report.passes.push((effect, status));
        }
        self.targets.encode_history_copy(&mut encoder);
        gpu.queue.submit(Some(encoder.finish()));
    }

    fn run_host(&mut self, report: &mut FrameReport) {
        for effect in EffectKind::ALL {
            let status = self.run_pass(effect);
            report.passes.push((effect, status));
        }
        if let Err(err) = self.targets.store_history() {
            log::warn!("Frame {}: history not updated: {err}", self.frame_index);
        }
    }

    fn run_pass(&mut self, effect: EffectKind) -> PassStatus {
        if self.registry.is_disabled(effect) {
            return PassStatus::Disabled;
        }
        let Some(program) = self.registry.program_for(effect) else {
            return PassStatus::Disabled;
        };

        let ctx = PassContext::new(&self.targets, program);
        let result = pass_for(effect)
            .run(&ctx)
            .and_then(|texels| self.targets.commit(effect.output_target(), texels));
        match result {
            Ok(()) => PassStatus::Rendered,
            Err(err) => {
                log::warn!("{effect} pass failed, keeping previous output: {err}");
                PassStatus::Failed(err)
            }
        }
    }

    /// The effect targets as of the last frame that produced them.
    #[must_use]
    pub fn outputs(&self) -> EffectOutputs<'_> {
        EffectOutputs {
            ssr: self.targets.target(TargetName::Ssr),
            ssao: self.targets.target(TargetName::Ssao),
            gi: self.targets.target(TargetName::Gi),
            intensities: self.intensities(),
        }
    }

    fn intensities(&self) -> EffectIntensities {
        let read = |effect: EffectKind, uniform: Uniform, fallback: f32| {
            self.registry
                .program_for(effect)
                .and_then(|p| p.f32(uniform).ok())
                .unwrap_or(fallback)
        };
        EffectIntensities {
            ssr: read(EffectKind::Ssr, Uniform::SsrIntensity, self.settings.ssr.intensity),
            ssao: read(EffectKind::Ssao, Uniform::SsaoIntensity, self.settings.ssao.intensity),
            gi: read(EffectKind::Gi, Uniform::GiIntensity, self.settings.gi.intensity),
        }
    }

    /// Replaces `history` with the compositor's final frame.
    ///
    /// Without this call `history` holds the uncomposited scene colour.
    pub fn submit_composited(&mut self, frame: &Texture) -> Result<()> {
        self.targets.upload(TargetName::History, frame)
    }

    /// Feeds a measured frame to the controller and applies any tier change.
    pub fn end_frame(&mut self, sample: PerformanceSample) -> Option<TierChange> {
        let change = self.controller.record(sample)?;
        self.registry.apply_quality(self.controller.tier());
        Some(change)
    }

    /// [`end_frame`](Self::end_frame) with the pipeline's own frame timer.
    pub fn end_frame_timed(&mut self) -> Option<TierChange> {
        let sample = self.timer.end_frame();
        self.end_frame(sample)
    }

    // ── Host Controls ────────────────────────────────────────────────────────

    /// Reallocates targets for a new viewport. Idempotent for an unchanged size.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<bool> {
        self.targets.resize(width, height)
    }

    pub fn set_adaptive(&mut self, enabled: bool) {
        self.controller.set_enabled(enabled);
    }

    pub fn force_tier(&mut self, name: &str) -> Result<Option<TierChange>> {
        let change = self.controller.force_tier(name)?;
        if change.is_some() {
            self.registry.apply_quality(self.controller.tier());
        }
        Ok(change)
    }

    /// Sets a uniform on an effect's live program.
    pub fn set_uniform(
        &mut self,
        effect: EffectKind,
        uniform: Uniform,
        value: impl Into<UniformValue>,
    ) -> Result<()> {
        let handle = self
            .registry
            .handle_for(effect)
            .ok_or(SsfxError::EffectDisabled(effect))?;
        self.registry.set_uniform(handle, uniform, value)
    }

    #[must_use]
    pub fn active_tier(&self) -> &QualityTier {
        self.controller.tier()
    }

    #[must_use]
    pub fn shadow_precision(&self) -> ShadowPrecision {
        self.controller.tier().shadow_precision
    }

    /// `true` when targets and passes live on the GPU.
    #[inline]
    #[must_use]
    pub fn is_device(&self) -> bool {
        matches!(self.backend, Backend::Device { .. })
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &RenderTargetManager {
        &self.targets
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ShaderRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn controller(&self) -> &AdaptiveQualityController {
        &self.controller
    }
}
