//! Adaptive Quality Controller
//!
//! Closed-loop controller that keeps measured frame time inside
//! `[0.8 × budget, 1.2 × budget]` by moving along a [`QualityLadder`].
//!
//! ```text
//!             frame_ms > 1.2 × budget          frame_ms < 0.8 × budget
//!   ◄── one tier down (cheaper) ──  current tier  ── one tier up (richer) ──►
//! ```
//!
//! # Hysteresis
//!
//! A sample is only evaluated when at least `hysteresis_ms` have elapsed since
//! the last adjustment; the first sample ever recorded sets that baseline.
//! Single-frame spikes therefore never move the tier, and the tier moves by
//! at most one step per window.
//!
//! # State
//!
//! O(1): the current ladder index, the most recent sample, and the time of
//! the last adjustment. No frame history is kept.

use std::fmt;

use crate::errors::{Result, SsfxError};
use crate::quality::{QualityLadder, QualityTier};
use crate::settings::PipelineSettings;

/// Frame time above `budget × OVER_BUDGET` lowers the tier.
pub const OVER_BUDGET: f64 = 1.2;
/// Frame time below `budget × UNDER_BUDGET` raises the tier.
pub const UNDER_BUDGET: f64 = 0.8;

/// One measured frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    pub frame_time_ms: f64,
    /// Monotonic time at which the frame finished.
    pub timestamp_ms: f64,
}

impl PerformanceSample {
    #[must_use]
    pub fn new(frame_time_ms: f64, timestamp_ms: f64) -> Self {
        Self {
            frame_time_ms,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward cheaper tiers.
    Down,
    /// Toward richer tiers.
    Up,
}

/// A tier transition, as ladder indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Down => "down",
            Self::Up => "up",
        })
    }
}

pub struct AdaptiveQualityController {
    ladder: QualityLadder,
    current: usize,
    budget_ms: f64,
    hysteresis_ms: f64,
    last_sample: Option<PerformanceSample>,
    last_adjustment_ms: Option<f64>,
    enabled: bool,
}

impl AdaptiveQualityController {
    /// Creates a controller starting at ladder index `initial`.
    pub fn new(
        ladder: QualityLadder,
        initial: usize,
        target_fps: f64,
        hysteresis_ms: f64,
    ) -> Result<Self> {
        ladder.validate()?;
        if initial >= ladder.len() {
            return Err(SsfxError::InvalidSettings(format!(
                "initial tier index {initial} is outside a ladder of {}",
                ladder.len()
            )));
        }
        if !target_fps.is_finite() || target_fps <= 0.0 {
            return Err(SsfxError::InvalidSettings(format!(
                "target_fps must be positive, got {target_fps}"
            )));
        }

        Ok(Self {
            ladder,
            current: initial,
            budget_ms: 1000.0 / target_fps,
            hysteresis_ms,
            last_sample: None,
            last_adjustment_ms: None,
            enabled: true,
        })
    }

    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        settings.validate()?;
        let initial = settings
            .ladder
            .position(&settings.initial_tier)
            .ok_or_else(|| {
                SsfxError::InvalidSettings(format!("unknown tier '{}'", settings.initial_tier))
            })?;
        let mut controller = Self::new(
            settings.ladder.clone(),
            initial,
            f64::from(settings.target_fps),
            settings.hysteresis_ms,
        )?;
        controller.enabled = settings.adaptive;
        Ok(controller)
    }

    /// Records a frame and, if the hysteresis window has elapsed, moves at
    /// most one tier.
    pub fn record(&mut self, sample: PerformanceSample) -> Option<TierChange> {
        self.last_sample = Some(sample);

        let Some(last_adjustment) = self.last_adjustment_ms else {
            self.last_adjustment_ms = Some(sample.timestamp_ms);
            return None;
        };

        if !self.enabled || sample.timestamp_ms - last_adjustment < self.hysteresis_ms {
            return None;
        }

        let from = self.current;
        let (to, direction) = if sample.frame_time_ms > self.budget_ms * OVER_BUDGET && from > 0 {
            (from - 1, Direction::Down)
        } else if sample.frame_time_ms < self.budget_ms * UNDER_BUDGET
            && from + 1 < self.ladder.len()
        {
            (from + 1, Direction::Up)
        } else {
            return None;
        };

        self.current = to;
        self.last_adjustment_ms = Some(sample.timestamp_ms);

        log::info!(
            "Quality {direction}: {} -> {} ({:.1} ms vs {:.1} ms budget)",
            self.ladder_name(from),
            self.ladder_name(to),
            sample.frame_time_ms,
            self.budget_ms
        );

        Some(TierChange {
            from,
            to,
            direction,
        })
    }

    fn ladder_name(&self, index: usize) -> &str {
        self.ladder.get(index).map_or("?", |t| t.name.as_str())
    }

    /// Jumps directly to the named tier, bypassing hysteresis.
    pub fn force_tier(&mut self, name: &str) -> Result<Option<TierChange>> {
        let to = self
            .ladder
            .position(name)
            .ok_or_else(|| SsfxError::InvalidSettings(format!("unknown tier '{name}'")))?;
        let from = self.current;
        if to == from {
            return Ok(None);
        }
        self.current = to;
        self.last_adjustment_ms = self.last_sample.map(|s| s.timestamp_ms);
        log::info!("Quality forced: {} -> {name}", self.ladder_name(from));
        Ok(Some(TierChange {
            from,
            to,
            direction: if to < from { Direction::Down } else { Direction::Up },
        }))
    }

    /// The active tier.
    #[must_use]
    pub fn tier(&self) -> &QualityTier {
        // `new` guarantees `current` is in range and tiers are never removed.
        &self.ladder.tiers()[self.current]
    }

    #[inline]
    #[must_use]
    pub fn tier_index(&self) -> usize {
        self.current
    }

    #[inline]
    #[must_use]
    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    #[inline]
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    #[inline]
    #[must_use]
    pub fn last_sample(&self) -> Option<PerformanceSample> {
        self.last_sample
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns adaptive scaling on or off. Samples are still recorded while off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
