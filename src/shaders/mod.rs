//! Shader Program Registry
//!
//! Owns the compiled program of every effect pass together with its uniform
//! table and texture bindings.
//!
//! ## Compilation
//!
//! ```text
//!  WGSL template ──minijinja──► WGSL ──naga parse──► Module ──naga validate──► reflect
//!   (rust-embed)   (chunks/*)          │                          │              │
//!                                      └──── diagnostic ──────────┴──► ShaderCompile
//!                                                                                │
//!            Params members ↔ Uniform table (defaults)  ◄─────────────────────────┘
//!            `<target>_map` texture globals ↔ binding slots ↔ render targets
//! ```
//!
//! A texture global whose name does not resolve to a render target is a
//! compile error, so a hot-reloaded source cannot reach the frame loop with
//! a slot nothing can be bound to.
//!
//! Compiled modules are deduplicated by hashing the **expanded** WGSL with
//! xxh3-128, so recompiling an unchanged source is free.
//!
//! ## Failure Policy
//!
//! A failed compile disables the effect for the session: the error is logged
//! once, any previous program of that effect is dropped, and the orchestrator
//! keeps rendering without it.

pub mod uniforms;

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use glam::{Mat4, Vec4};
use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{Result, SsfxError};
use crate::quality::{MAX_SSAO_SAMPLES, QualityTier};
use crate::targets::TargetName;

pub use uniforms::{NOISE_TILE_TEXELS, Uniform, UniformKind, UniformValue};

// ─── Effect Kinds ─────────────────────────────────────────────────────────────

/// The three screen-space effects.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EffectKind {
    Ssr,
    Ssao,
    Gi,
}

impl EffectKind {
    /// Execution order within a frame.
    pub const ALL: [EffectKind; 3] = [Self::Ssao, Self::Ssr, Self::Gi];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ssr => "SSR",
            Self::Ssao => "SSAO",
            Self::Gi => "GI",
        }
    }

    /// Name of the built-in template under `src/shaders/wgsl`.
    #[must_use]
    pub fn template_name(self) -> &'static str {
        match self {
            Self::Ssr => "passes/ssr",
            Self::Ssao => "passes/ssao",
            Self::Gi => "passes/gi",
        }
    }

    /// The target this effect writes.
    #[must_use]
    pub fn output_target(self) -> TargetName {
        match self {
            Self::Ssr => TargetName::Ssr,
            Self::Ssao => TargetName::Ssao,
            Self::Gi => TargetName::Gi,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Template Environment ─────────────────────────────────────────────────────

pub static SHADER_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/shaders/wgsl"]
struct ShaderAssets;

pub fn get_env() -> &'static Environment<'static> {
    SHADER_ENV.get_or_init(|| {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()
            .expect("Failed to configure Jinja2 syntax");

        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        env.set_loader(shader_loader);
        env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());

        env.add_global("max_ssao_samples", MAX_SSAO_SAMPLES);
        env.add_global("noise_texels", NOISE_TILE_TEXELS);

        env
    })
}

/// Resolves template names against the embedded WGSL tree.
///
/// Edited sources are applied at runtime through
/// [`ShaderRegistry::compile`], not by re-reading this tree.
fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    let Some(file) = ShaderAssets::get(&filename) else {
        return Ok(None);
    };
    std::str::from_utf8(file.data.as_ref())
        .map(|source| Some(source.to_string()))
        .map_err(|e| Error::new(ErrorKind::TemplateNotFound, format!("{filename}: {e}")))
}

/// Returns the raw (unexpanded) built-in template of an effect.
pub fn builtin_source(effect: EffectKind) -> Result<String> {
    shader_loader(effect.template_name())
        .map_err(|e| compile_error(effect, e.to_string()))?
        .ok_or_else(|| compile_error(effect, format!("template '{}' not found", effect.template_name())))
}

fn compile_error(effect: EffectKind, diagnostic: String) -> SsfxError {
    SsfxError::ShaderCompile { effect, diagnostic }
}

// ─── Reflection ───────────────────────────────────────────────────────────────

/// A member of the program's `Params` uniform block.
#[derive(Clone, Copy, Debug)]
struct UniformSlot {
    uniform: Uniform,
    offset: u32,
}

/// A compiled, validated, reflected WGSL module. Shared between programs
/// with identical expanded source.
#[derive(Debug)]
pub struct CompiledModule {
    source: String,
    module: naga::Module,
    block_size: u32,
    uniforms: SmallVec<[UniformSlot; 16]>,
    textures: SmallVec<[(u32, String, TargetName); 4]>,
}

impl CompiledModule {
    fn build(effect: EffectKind, source: String) -> Result<Self> {
        let source_ref = source.as_str();
        let module = naga::front::wgsl::parse_str(source_ref)
            .map_err(|e| compile_error(effect, e.emit_to_string(source_ref)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| compile_error(effect, e.emit_to_string(source_ref)))?;

        let mut block_size = 0;
        let mut uniforms = SmallVec::new();
        let mut textures = SmallVec::new();

        for (_, var) in module.global_variables.iter() {
            match var.space {
                naga::AddressSpace::Uniform => {
                    let naga::TypeInner::Struct { members, span } = &module.types[var.ty].inner
                    else {
                        return Err(compile_error(
                            effect,
                            "uniform block must be a struct".to_string(),
                        ));
                    };
                    block_size = *span;

                    for member in members {
                        let name = member.name.clone().unwrap_or_default();
                        let uniform: Uniform = name.parse().map_err(|()| {
                            SsfxError::MissingUniformDefault {
                                effect,
                                name: name.clone(),
                            }
                        })?;

                        let declared = classify(&module, member.ty);
                        if declared != Some(uniform.kind()) {
                            return Err(compile_error(
                                effect,
                                format!(
                                    "uniform '{name}' must be declared as {}",
                                    uniform.kind().wgsl_name()
                                ),
                            ));
                        }

                        uniforms.push(UniformSlot {
                            uniform,
                            offset: member.offset,
                        });
                    }
                }
                naga::AddressSpace::Handle => {
                    if matches!(module.types[var.ty].inner, naga::TypeInner::Image { .. })
                        && let Some(binding) = &var.binding
                    {
                        let name = var.name.clone().unwrap_or_default();
                        let target = texture_target(&name).ok_or_else(|| {
                            compile_error(
                                effect,
                                format!(
                                    "texture '{name}' at binding {} does not name a render target",
                                    binding.binding
                                ),
                            )
                        })?;
                        textures.push((binding.binding, name, target));
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            source,
            module,
            block_size,
            uniforms,
            textures,
        })
    }

    #[inline]
    #[must_use]
    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// The expanded WGSL the module was built from.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// `color_map` → `color`; `None` for names outside the target set.
fn texture_target(name: &str) -> Option<TargetName> {
    name.strip_suffix("_map")?.parse().ok()
}

fn classify(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<UniformKind> {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match &module.types[ty].inner {
        TypeInner::Scalar(s) if s.width == 4 && s.kind == ScalarKind::Float => Some(UniformKind::F32),
        TypeInner::Scalar(s) if s.width == 4 && s.kind == ScalarKind::Uint => Some(UniformKind::U32),
        TypeInner::Vector {
            size: VectorSize::Bi,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformKind::Vec2),
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformKind::Mat4),
        TypeInner::Array { base, .. } if classify(module, *base) == Some(UniformKind::Vec4) => {
            Some(UniformKind::Vec4Array)
        }
        _ => None,
    }
}

// ─── Programs ─────────────────────────────────────────────────────────────────

/// Opaque handle to a program owned by the [`ShaderRegistry`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramHandle(u32);

/// A compiled program plus its current uniform values and texture bindings.
#[derive(Debug)]
pub struct ShaderProgram {
    effect: EffectKind,
    source_hash: u128,
    compiled: Arc<CompiledModule>,
    values: FxHashMap<Uniform, UniformValue>,
    bindings: FxHashMap<u32, TargetName>,
}

impl ShaderProgram {
    fn new(effect: EffectKind, source_hash: u128, compiled: Arc<CompiledModule>) -> Self {
        let values = compiled
            .uniforms
            .iter()
            .map(|slot| (slot.uniform, slot.uniform.default_value()))
            .collect();
        Self {
            effect,
            source_hash,
            compiled,
            values,
            bindings: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn effect(&self) -> EffectKind {
        self.effect
    }

    #[inline]
    #[must_use]
    pub fn source_hash(&self) -> u128 {
        self.source_hash
    }

    #[inline]
    #[must_use]
    pub fn module(&self) -> &naga::Module {
        self.compiled.module()
    }

    #[inline]
    #[must_use]
    pub fn declares(&self, uniform: Uniform) -> bool {
        self.values.contains_key(&uniform)
    }

    /// Uniforms declared by the program, in block order.
    pub fn declared_uniforms(&self) -> impl Iterator<Item = Uniform> + '_ {
        self.compiled.uniforms.iter().map(|slot| slot.uniform)
    }

    /// `(slot, variable name)` of every texture the program samples.
    pub fn texture_slots(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.compiled
            .textures
            .iter()
            .map(|(slot, name, _)| (*slot, name.as_str()))
    }

    /// `(slot, target)` pairs implied by the texture variable names.
    pub fn texture_targets(&self) -> impl Iterator<Item = (u32, TargetName)> + '_ {
        self.compiled
            .textures
            .iter()
            .map(|(slot, _, target)| (*slot, *target))
    }

    /// Expanded WGSL of the program.
    #[inline]
    #[must_use]
    pub fn wgsl(&self) -> &str {
        self.compiled.source()
    }

    pub fn uniform(&self, uniform: Uniform) -> Result<&UniformValue> {
        self.values
            .get(&uniform)
            .ok_or_else(|| SsfxError::UnknownUniform {
                effect: self.effect,
                name: uniform.name().to_string(),
            })
    }

    fn mismatch(&self, uniform: Uniform, actual: &UniformValue) -> SsfxError {
        SsfxError::UniformTypeMismatch {
            effect: self.effect,
            name: uniform.name(),
            expected: uniform.kind().wgsl_name(),
            actual: actual.kind().wgsl_name(),
        }
    }

    pub fn f32(&self, uniform: Uniform) -> Result<f32> {
        match self.uniform(uniform)? {
            UniformValue::F32(v) => Ok(*v),
            other => Err(self.mismatch(uniform, other)),
        }
    }

    pub fn u32(&self, uniform: Uniform) -> Result<u32> {
        match self.uniform(uniform)? {
            UniformValue::U32(v) => Ok(*v),
            other => Err(self.mismatch(uniform, other)),
        }
    }

    pub fn vec4(&self, uniform: Uniform) -> Result<Vec4> {
        match self.uniform(uniform)? {
            UniformValue::Vec4(v) => Ok(*v),
            other => Err(self.mismatch(uniform, other)),
        }
    }

    pub fn mat4(&self, uniform: Uniform) -> Result<Mat4> {
        match self.uniform(uniform)? {
            UniformValue::Mat4(v) => Ok(*v),
            other => Err(self.mismatch(uniform, other)),
        }
    }

    pub fn vec4_array(&self, uniform: Uniform) -> Result<&[Vec4]> {
        match self.uniform(uniform)? {
            UniformValue::Vec4Array(v) => Ok(v.as_slice()),
            other => Err(self.mismatch(uniform, other)),
        }
    }

    fn set(&mut self, uniform: Uniform, value: UniformValue) -> Result<()> {
        if !self.declares(uniform) {
            return Err(SsfxError::UnknownUniform {
                effect: self.effect,
                name: uniform.name().to_string(),
            });
        }
        if value.kind() != uniform.kind() {
            return Err(self.mismatch(uniform, &value));
        }
        self.values.insert(uniform, value);
        Ok(())
    }

    /// The target bound at `slot`.
    pub fn bound_target(&self, slot: u32) -> Result<TargetName> {
        self.bindings
            .get(&slot)
            .copied()
            .ok_or(SsfxError::UnboundTexture {
                effect: self.effect,
                slot,
            })
    }

    /// Packs the uniform table into the byte layout reported by naga.
    #[must_use]
    pub fn pack_uniforms(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.compiled.block_size as usize];
        for slot in &self.compiled.uniforms {
            if let Some(value) = self.values.get(&slot.uniform) {
                value.write_into(&mut block, slot.offset as usize);
            }
        }
        block
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

/// Owner of all effect programs.
#[derive(Default)]
pub struct ShaderRegistry {
    /// xxh3-128 of expanded WGSL → compiled module.
    module_cache: FxHashMap<u128, Arc<CompiledModule>>,
    programs: FxHashMap<ProgramHandle, ShaderProgram>,
    by_effect: FxHashMap<EffectKind, ProgramHandle>,
    disabled: FxHashSet<EffectKind>,
    next_handle: u32,
}

impl ShaderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expands, compiles and registers `source` as the program for `effect`.
    ///
    /// A successful compile replaces any earlier program of the effect and
    /// re-enables it. A failure disables the effect and is logged once.
    pub fn compile(&mut self, effect: EffectKind, source: &str) -> Result<ProgramHandle> {
        match self.build(effect, source) {
            Ok(program) => {
                let handle = ProgramHandle(self.next_handle);
                self.next_handle += 1;

                if let Some(old) = self.by_effect.insert(effect, handle) {
                    self.programs.remove(&old);
                }
                self.programs.insert(handle, program);

                if self.disabled.remove(&effect) {
                    log::info!("{effect} re-enabled after successful compile");
                }
                Ok(handle)
            }
            Err(err) => {
                self.disable(effect, &err);
                Err(err)
            }
        }
    }

    /// Compiles the embedded template of `effect`.
    pub fn compile_builtin(&mut self, effect: EffectKind) -> Result<ProgramHandle> {
        match builtin_source(effect) {
            Ok(source) => self.compile(effect, &source),
            Err(err) => {
                if self.disabled.insert(effect) {
                    log::error!("{effect} disabled for this session: {err}");
                }
                Err(err)
            }
        }
    }

    fn build(&mut self, effect: EffectKind, source: &str) -> Result<ShaderProgram> {
        let expanded = get_env()
            .render_str(source, minijinja::context! {})
            .map_err(|e| compile_error(effect, e.to_string()))?;

        log::trace!("Expanded {effect} shader:\n{expanded}");

        let hash = xxh3_128(expanded.as_bytes());
        let compiled = if let Some(cached) = self.module_cache.get(&hash) {
            Arc::clone(cached)
        } else {
            let compiled = Arc::new(CompiledModule::build(effect, expanded)?);
            self.module_cache.insert(hash, Arc::clone(&compiled));
            compiled
        };

        Ok(ShaderProgram::new(effect, hash, compiled))
    }

    pub fn program(&self, handle: ProgramHandle) -> Result<&ShaderProgram> {
        self.programs
            .get(&handle)
            .ok_or(SsfxError::InvalidProgram(handle.0))
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Result<&mut ShaderProgram> {
        self.programs
            .get_mut(&handle)
            .ok_or(SsfxError::InvalidProgram(handle.0))
    }

    /// The live program of an effect, if it compiled.
    #[must_use]
    pub fn program_for(&self, effect: EffectKind) -> Option<&ShaderProgram> {
        self.by_effect
            .get(&effect)
            .and_then(|handle| self.programs.get(handle))
    }

    #[must_use]
    pub fn handle_for(&self, effect: EffectKind) -> Option<ProgramHandle> {
        self.by_effect.get(&effect).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_disabled(&self, effect: EffectKind) -> bool {
        self.disabled.contains(&effect)
    }

    pub fn set_uniform(
        &mut self,
        handle: ProgramHandle,
        uniform: Uniform,
        value: impl Into<UniformValue>,
    ) -> Result<()> {
        self.program_mut(handle)?.set(uniform, value.into())
    }

    /// Sets `uniform` only if the program declares it.
    ///
    /// Returns whether the value was written.
    pub fn set_declared(
        &mut self,
        handle: ProgramHandle,
        uniform: Uniform,
        value: impl Into<UniformValue>,
    ) -> Result<bool> {
        let program = self.program_mut(handle)?;
        if !program.declares(uniform) {
            return Ok(false);
        }
        program.set(uniform, value.into())?;
        Ok(true)
    }

    /// String-keyed variant of [`set_uniform`](Self::set_uniform).
    pub fn set_uniform_by_name(
        &mut self,
        handle: ProgramHandle,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<()> {
        let program = self.program_mut(handle)?;
        let uniform: Uniform = name.parse().map_err(|()| SsfxError::UnknownUniform {
            effect: program.effect,
            name: name.to_string(),
        })?;
        program.set(uniform, value.into())
    }

    /// Binds the target named `target` to a texture slot.
    pub fn bind_texture(&mut self, handle: ProgramHandle, slot: u32, target: &str) -> Result<()> {
        self.bind_target(handle, slot, target.parse()?)
    }

    pub fn bind_target(&mut self, handle: ProgramHandle, slot: u32, target: TargetName) -> Result<()> {
        self.program_mut(handle)?.bindings.insert(slot, target);
        Ok(())
    }

    /// Drops the effect's program and disables it until the next successful
    /// compile. Used when a program compiles but cannot be turned into a
    /// GPU pipeline.
    pub fn disable(&mut self, effect: EffectKind, err: &SsfxError) {
        if let Some(old) = self.by_effect.remove(&effect) {
            self.programs.remove(&old);
        }
        if self.disabled.insert(effect) {
            log::error!("{effect} disabled for this session: {err}");
        }
    }

    /// Pushes a tier's step/sample counts into every program that declares them.
    ///
    /// Returns the number of uniforms written.
    pub fn apply_quality(&mut self, tier: &QualityTier) -> usize {
        let counts = [
            (Uniform::SsrSteps, tier.ssr_steps),
            (Uniform::SsrBinarySteps, tier.ssr_binary_steps),
            (Uniform::SsaoSamples, tier.ssao_samples),
            (Uniform::GiSamples, tier.gi_samples),
        ];

        let mut written = 0;
        for program in self.programs.values_mut() {
            for (uniform, count) in counts {
                if program.declares(uniform) && program.set(uniform, UniformValue::U32(count)).is_ok()
                {
                    written += 1;
                }
            }
        }
        log::debug!("Applied quality tier {tier} ({written} uniforms)");
        written
    }

    /// Number of distinct compiled modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_cache.len()
    }
}
