//! Quality Tiers
//!
//! A [`QualityTier`] is an immutable bundle of sample/step counts. Tiers are
//! arranged in a fixed [`QualityLadder`] ordered by ascending GPU cost; the
//! adaptive controller only ever moves an index along that ladder and never
//! edits tier contents.
//!
//! # Default Ladder
//!
//! | Tier          | SSR steps | SSR refine | SSAO samples | GI samples | Shadows |
//! |---------------|-----------|------------|--------------|------------|---------|
//! | `draft`       | 8         | 2          | 4            | 2          | Low     |
//! | `competition` | 16        | 4          | 8            | 4          | Medium  |
//! | `broadcast`   | 32        | 8          | 16           | 8          | High    |
//! | `cinematic`   | 64        | 16         | 32           | 16         | Ultra   |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SsfxError;

/// Upper bound on SSAO samples (size of the precomputed hemisphere kernel).
pub const MAX_SSAO_SAMPLES: u32 = 64;

/// Shadow-map precision hint carried by each tier.
///
/// Shadow mapping itself happens outside this crate; the host reads the
/// active tier's precision and sizes its shadow maps accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowPrecision {
    Low,
    Medium,
    High,
    Ultra,
}

impl ShadowPrecision {
    /// Shadow map edge length in texels for this precision.
    #[must_use]
    pub fn map_size(self) -> u32 {
        match self {
            Self::Low => 512,
            Self::Medium => 1024,
            Self::High => 2048,
            Self::Ultra => 4096,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl FromStr for ShadowPrecision {
    type Err = SsfxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(SsfxError::InvalidSettings(format!(
                "unknown shadow precision '{other}'"
            ))),
        }
    }
}

/// A named, immutable configuration of sample/step counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTier {
    pub name: String,
    pub ssr_steps: u32,
    pub ssr_binary_steps: u32,
    pub ssao_samples: u32,
    pub gi_samples: u32,
    pub shadow_precision: ShadowPrecision,
}

impl QualityTier {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        ssr_steps: u32,
        ssr_binary_steps: u32,
        ssao_samples: u32,
        gi_samples: u32,
        shadow_precision: ShadowPrecision,
    ) -> Self {
        Self {
            name: name.into(),
            ssr_steps,
            ssr_binary_steps,
            ssao_samples,
            gi_samples,
            shadow_precision,
        }
    }

    /// Rough per-pixel cost used to check ladder ordering.
    ///
    /// Each SSR step, refinement step, and hemisphere sample costs one depth
    /// fetch; GI runs at quarter pixel count.
    #[must_use]
    pub fn relative_cost(&self) -> f32 {
        (self.ssr_steps + self.ssr_binary_steps + self.ssao_samples) as f32
            + self.gi_samples as f32 * 0.25
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}/{}/{}, shadows {})",
            self.name,
            self.ssr_steps,
            self.ssr_binary_steps,
            self.ssao_samples,
            self.gi_samples,
            self.shadow_precision.name()
        )
    }
}

/// Ordered list of tiers, cheapest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityLadder {
    tiers: Vec<QualityTier>,
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self {
            tiers: vec![
                QualityTier::new("draft", 8, 2, 4, 2, ShadowPrecision::Low),
                QualityTier::new("competition", 16, 4, 8, 4, ShadowPrecision::Medium),
                QualityTier::new("broadcast", 32, 8, 16, 8, ShadowPrecision::High),
                QualityTier::new("cinematic", 64, 16, 32, 16, ShadowPrecision::Ultra),
            ],
        }
    }
}

impl QualityLadder {
    /// Builds a ladder, checking it is non-empty, ascending in cost, and
    /// within the kernel limits.
    pub fn new(tiers: Vec<QualityTier>) -> crate::errors::Result<Self> {
        let ladder = Self { tiers };
        ladder.validate()?;
        Ok(ladder)
    }

    pub fn validate(&self) -> crate::errors::Result<()> {
        if self.tiers.is_empty() {
            return Err(SsfxError::InvalidSettings(
                "quality ladder must contain at least one tier".into(),
            ));
        }

        for tier in &self.tiers {
            if tier.ssr_steps == 0 || tier.ssao_samples == 0 || tier.gi_samples == 0 {
                return Err(SsfxError::InvalidSettings(format!(
                    "tier '{}' has a zero step or sample count",
                    tier.name
                )));
            }
            if tier.ssao_samples > MAX_SSAO_SAMPLES {
                return Err(SsfxError::InvalidSettings(format!(
                    "tier '{}' requests {} SSAO samples (max {MAX_SSAO_SAMPLES})",
                    tier.name, tier.ssao_samples
                )));
            }
        }

        for pair in self.tiers.windows(2) {
            if pair[1].relative_cost() <= pair[0].relative_cost() {
                return Err(SsfxError::InvalidSettings(format!(
                    "tier '{}' is not more expensive than '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }

        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QualityTier> {
        self.tiers.get(index)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tiers.iter().position(|t| t.name == name)
    }

    #[inline]
    #[must_use]
    pub fn tiers(&self) -> &[QualityTier] {
        &self.tiers
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualityTier> {
        self.tiers.iter()
    }
}
