//! Effect Passes (host reference)
//!
//! Each pass is a fullscreen evaluation of one effect program on the CPU,
//! mirroring the WGSL the GPU backend runs. They drive the pipeline when it
//! is built without a device and pin down the kernels' behaviour in tests.
//! A pass reads its inputs exclusively through the [`PassContext`]: textures
//! via the program's bound slots, tunables via the program's uniform table.
//!
//! | Pass        | Inputs (slot → target)                        | Output           |
//! |-------------|-----------------------------------------------|------------------|
//! | [`SsaoPass`] | 0 depth, 1 normal                            | `ssao` (full)    |
//! | [`SsrPass`]  | 0 depth, 1 normal, 2 color                   | `ssr` (full)     |
//! | [`GiPass`]   | 0 depth, 1 normal, 2 history, 3 ssao         | `gi` (half)      |
//!
//! A pass returns the new texel data instead of writing the target in place;
//! the orchestrator commits it only when the pass succeeds, so a failing pass
//! leaves the previous output untouched.

pub mod common;
pub mod gi;
pub mod ssao;
pub mod ssr;

use glam::Vec4;

use crate::errors::{Result, SsfxError};
use crate::shaders::{EffectKind, ShaderProgram};
use crate::targets::{RenderTarget, RenderTargetManager};
use crate::texture::Texture;

pub use gi::GiPass;
pub use ssao::SsaoPass;
pub use ssr::SsrPass;

/// Read-only view handed to a pass for one frame.
pub struct PassContext<'a> {
    pub targets: &'a RenderTargetManager,
    pub program: &'a ShaderProgram,
}

impl<'a> PassContext<'a> {
    #[must_use]
    pub fn new(targets: &'a RenderTargetManager, program: &'a ShaderProgram) -> Self {
        Self { targets, program }
    }

    /// The host texture bound at `slot` of the program.
    pub fn texture(&self, slot: u32) -> Result<&'a Texture> {
        let name = self.program.bound_target(slot)?;
        self.targets
            .target(name)
            .host()
            .ok_or(SsfxError::WrongResidency(name))
    }

    /// The target this pass writes.
    #[must_use]
    pub fn output(&self) -> &'a RenderTarget {
        self.targets.target(self.program.effect().output_target())
    }
}

/// A screen-space effect pass.
pub trait EffectPass {
    fn kind(&self) -> EffectKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Evaluates the pass and returns the texels of its output target.
    fn run(&self, ctx: &PassContext) -> Result<Vec<Vec4>>;
}
