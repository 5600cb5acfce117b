//! Error Types
//!
//! This module defines the error types used throughout the effect pipeline.
//!
//! # Overview
//!
//! The main error type [`SsfxError`] covers every failure mode of the
//! screen-space pipeline. None of them is allowed to take down the render
//! loop: the orchestrator converts each one into a local degradation.
//!
//! | Variant                   | Class            | Frame-loop behavior                     |
//! |---------------------------|------------------|-----------------------------------------|
//! | `ShaderCompile`           | Environment      | Effect disabled for the session         |
//! | `UnknownTarget`           | Programmer error | panic in debug / ignored in release     |
//! | `UnknownUniform`          | Programmer error | panic in debug / ignored in release     |
//! | `MissingSceneBuffer`      | Upstream         | Effects skipped, stale outputs reused   |
//! | `SceneBufferSizeMismatch` | Upstream         | Effects skipped, stale outputs reused   |
//! | `AdapterRequestFailed`    | Environment      | Returned from construction              |
//! | `Readback`                | Environment      | Returned to the caller                  |
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SsfxError>`.

use thiserror::Error;

use crate::shaders::EffectKind;
use crate::targets::TargetName;

/// The main error type for the screen-space effect pipeline.
#[derive(Error, Debug)]
pub enum SsfxError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A program failed to build. Carries the compiler diagnostic text.
    #[error("Shader compile error ({effect}): {diagnostic}")]
    ShaderCompile {
        /// The effect whose program failed.
        effect: EffectKind,
        /// Diagnostic emitted by the WGSL front-end or validator.
        diagnostic: String,
    },

    /// `set_uniform` was called with a uniform the program never declared.
    #[error("Unknown uniform '{name}' for {effect} program")]
    UnknownUniform {
        /// The effect whose program was addressed.
        effect: EffectKind,
        /// The uniform name that was looked up.
        name: String,
    },

    /// A program declares a uniform that has no registered default.
    #[error("Uniform '{name}' of {effect} program has no registered default")]
    MissingUniformDefault {
        /// The effect whose program was compiled.
        effect: EffectKind,
        /// The declared uniform member.
        name: String,
    },

    /// The program handle does not refer to a live program.
    #[error("Invalid program handle: {0}")]
    InvalidProgram(u32),

    /// A uniform was set with a value of the wrong shape.
    #[error("Uniform '{name}' of {effect} program expects {expected}, got {actual}")]
    UniformTypeMismatch {
        /// The effect whose program was addressed.
        effect: EffectKind,
        /// The uniform name.
        name: &'static str,
        /// Declared kind.
        expected: &'static str,
        /// Supplied kind.
        actual: &'static str,
    },

    /// A pass read a texture slot that has no bound target.
    #[error("{effect} program has no texture bound at slot {slot}")]
    UnboundTexture {
        /// The effect whose program was addressed.
        effect: EffectKind,
        /// Binding slot.
        slot: u32,
    },

    /// The effect is disabled for the session after a failed compile.
    #[error("{0} is disabled")]
    EffectDisabled(EffectKind),

    // ========================================================================
    // Render Target Errors
    // ========================================================================
    /// A target name outside the fixed set was requested.
    #[error("Unknown render target: {0}")]
    UnknownTarget(String),

    /// A zero-sized resolution was requested.
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Texel data does not cover `width * height` texels.
    #[error("Texture '{label}' needs {expected} texels, got {actual}")]
    TexelCountMismatch {
        /// Texture label.
        label: &'static str,
        /// `width * height`.
        expected: usize,
        /// Supplied texel count.
        actual: usize,
    },

    /// Texel data cannot be converted to or from this format.
    #[error("Unsupported texel format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    /// A pass addressed a target that lives on the other side of the bus.
    #[error("Render target '{0}' is not resident where the pass runs")]
    WrongResidency(TargetName),

    // ========================================================================
    // GPU Errors
    // ========================================================================
    /// No suitable adapter was found.
    #[error("Failed to request adapter: {0}")]
    AdapterRequestFailed(String),

    /// Device creation failed.
    #[error("Failed to create device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Copying a target back to the host failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),

    // ========================================================================
    // Scene Input Errors
    // ========================================================================
    /// Upstream scene code did not supply a required buffer.
    #[error("Missing scene buffer: {0}")]
    MissingSceneBuffer(TargetName),

    /// A supplied scene buffer does not match the viewport resolution.
    #[error(
        "Scene buffer '{target}' is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    SceneBufferSizeMismatch {
        /// Target the buffer was meant for.
        target: TargetName,
        /// Supplied width.
        actual_width: u32,
        /// Supplied height.
        actual_height: u32,
        /// Target width.
        expected_width: u32,
        /// Target height.
        expected_height: u32,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result<T, SsfxError>`.
pub type Result<T> = std::result::Result<T, SsfxError>;
