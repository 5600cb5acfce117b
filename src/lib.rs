#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod camera;
pub mod controller;
pub mod errors;
pub mod gpu;
pub mod passes;
pub mod pipeline;
pub mod quality;
pub mod settings;
pub mod shaders;
pub mod targets;
pub mod texture;
pub mod utils;

pub use camera::Camera;
pub use controller::{AdaptiveQualityController, Direction, PerformanceSample, TierChange};
pub use errors::{Result, SsfxError};
pub use gpu::GpuContext;
pub use pipeline::{
    EffectIntensities, EffectOutputs, EffectPipeline, FrameReport, PassStatus, PipelineState,
    SceneBuffers,
};
pub use quality::{QualityLadder, QualityTier, ShadowPrecision};
pub use settings::PipelineSettings;
pub use shaders::{EffectKind, ProgramHandle, ShaderProgram, ShaderRegistry, Uniform, UniformValue};
pub use targets::{RenderTarget, RenderTargetManager, TargetName};
pub use texture::Texture;
