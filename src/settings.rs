//! Pipeline Settings
//!
//! Configuration surface consumed once when the pipeline is built.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use arena_ssfx::settings::PipelineSettings;
//!
//! // Defaults: 60 fps target, adaptive scaling on, start at "broadcast"
//! let settings = PipelineSettings::default();
//!
//! // Locked 30 fps budget for a low-end replay station
//! let settings = PipelineSettings {
//!     target_fps: 30.0,
//!     initial_tier: "competition".into(),
//!     ..Default::default()
//! };
//!
//! // From a JSON document shipped next to the binary
//! let settings = PipelineSettings::from_json_str(&std::fs::read_to_string("ssfx.json")?)?;
//! ```
//!
//! # Fields
//!
//! | Field           | Description                                  | Default       |
//! |-----------------|----------------------------------------------|---------------|
//! | `target_fps`    | Frame rate the controller steers toward      | `60.0`        |
//! | `adaptive`      | Enable the adaptive quality controller       | `true`        |
//! | `initial_tier`  | Tier name active on the first frame          | `"broadcast"` |
//! | `hysteresis_ms` | Minimum time between two tier adjustments    | `2000.0`      |
//! | `ladder`        | Ordered quality tiers (cheapest first)       | 4 tiers       |
//! | `ssr` / `ssao` / `gi` | Per-effect tunables not driven by tiers | see below   |

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SsfxError};
use crate::quality::QualityLadder;

// ---------------------------------------------------------------------------
// Per-effect tunables
// ---------------------------------------------------------------------------

/// Screen-space reflection tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrSettings {
    /// Maximum view-space distance a reflection ray travels.
    pub max_distance: f32,
    /// Depth tolerance for accepting a hit, in view-space units.
    pub thickness: f32,
    /// Exponent of the Fresnel term `pow(1 - N·V, p)`.
    pub fresnel_power: f32,
    /// UV width of the screen-edge fade band.
    pub edge_fade: f32,
    /// Overall reflection intensity handed to the compositor.
    pub intensity: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            max_distance: 20.0,
            thickness: 0.5,
            fresnel_power: 2.0,
            edge_fade: 0.1,
            intensity: 1.0,
        }
    }
}

/// Ambient occlusion tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    /// Hemisphere radius in view-space units.
    pub radius: f32,
    /// Depth bias preventing self-occlusion.
    pub bias: f32,
    /// Exponent applied to the final visibility.
    pub intensity: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            radius: 0.5,
            bias: 0.025,
            intensity: 1.0,
        }
    }
}

/// Indirect lighting tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiSettings {
    /// Hemisphere radius in view-space units.
    pub radius: f32,
    /// Scalar applied to the averaged bounce light.
    pub intensity: f32,
}

impl Default for GiSettings {
    fn default() -> Self {
        Self {
            radius: 2.0,
            intensity: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

/// Global configuration for pipeline initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub target_fps: f32,
    pub adaptive: bool,
    pub initial_tier: String,
    pub hysteresis_ms: f64,
    pub ladder: QualityLadder,
    pub ssr: SsrSettings,
    pub ssao: SsaoSettings,
    pub gi: GiSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            adaptive: true,
            initial_tier: "broadcast".to_string(),
            hysteresis_ms: 2000.0,
            ladder: QualityLadder::default(),
            ssr: SsrSettings::default(),
            ssao: SsaoSettings::default(),
            gi: GiSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Parses and validates settings from a JSON document.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Frame-time budget in milliseconds derived from `target_fps`.
    #[inline]
    #[must_use]
    pub fn frame_budget_ms(&self) -> f32 {
        1000.0 / self.target_fps
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(SsfxError::InvalidSettings(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if !self.hysteresis_ms.is_finite() || self.hysteresis_ms < 0.0 {
            return Err(SsfxError::InvalidSettings(format!(
                "hysteresis_ms must be non-negative, got {}",
                self.hysteresis_ms
            )));
        }
        self.ladder.validate()?;
        if self.ladder.position(&self.initial_tier).is_none() {
            return Err(SsfxError::InvalidSettings(format!(
                "initial tier '{}' is not part of the ladder",
                self.initial_tier
            )));
        }
        if self.ssr.max_distance <= 0.0 || self.ssao.radius <= 0.0 || self.gi.radius <= 0.0 {
            return Err(SsfxError::InvalidSettings(
                "effect distances and radii must be positive".into(),
            ));
        }
        if !self.ssao.intensity.is_finite() || self.ssao.intensity <= 0.0 {
            return Err(SsfxError::InvalidSettings(format!(
                "ssao.intensity must be positive, got {}",
                self.ssao.intensity
            )));
        }
        Ok(())
    }
}
