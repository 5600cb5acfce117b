//! Adaptive Quality Controller Tests
//!
//! Tests for:
//! - Baseline: first sample never moves the tier
//! - Hysteresis: alternating spikes inside the window are ignored
//! - Sustained load: exactly one step per window, in the right direction
//! - Ladder bounds, forced tiers, disabled scaling
//! - Construction from settings

use arena_ssfx::controller::{
    AdaptiveQualityController, Direction, PerformanceSample, TierChange,
};
use arena_ssfx::quality::QualityLadder;
use arena_ssfx::settings::PipelineSettings;
use arena_ssfx::SsfxError;

const EPSILON: f64 = 1e-6;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

const DRAFT: usize = 0;
const COMPETITION: usize = 1;
const BROADCAST: usize = 2;
const CINEMATIC: usize = 3;

fn controller_at(initial: usize) -> AdaptiveQualityController {
    AdaptiveQualityController::new(QualityLadder::default(), initial, 60.0, 2000.0).unwrap()
}

/// Feeds frames of `frame_ms` back to back from `start_ms` until `end_ms`,
/// collecting every tier change.
fn feed(
    controller: &mut AdaptiveQualityController,
    frame_ms: f64,
    start_ms: f64,
    end_ms: f64,
) -> Vec<TierChange> {
    let mut changes = Vec::new();
    let mut t = start_ms;
    while t <= end_ms {
        if let Some(change) = controller.record(PerformanceSample::new(frame_ms, t)) {
            changes.push(change);
        }
        t += frame_ms;
    }
    changes
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn budget_follows_target_fps() {
    let controller = controller_at(BROADCAST);
    assert!(approx(controller.budget_ms(), 1000.0 / 60.0));
    assert_eq!(controller.tier().name, "broadcast");
    assert!(controller.last_sample().is_none());
}

#[test]
fn initial_index_out_of_range_fails() {
    let result = AdaptiveQualityController::new(QualityLadder::default(), 4, 60.0, 2000.0);
    assert!(matches!(result, Err(SsfxError::InvalidSettings(_))));
}

#[test]
fn non_positive_fps_fails() {
    let result = AdaptiveQualityController::new(QualityLadder::default(), 0, 0.0, 2000.0);
    assert!(matches!(result, Err(SsfxError::InvalidSettings(_))));
}

#[test]
fn from_settings_uses_named_initial_tier() {
    let settings = PipelineSettings {
        initial_tier: "competition".into(),
        adaptive: false,
        ..Default::default()
    };
    let controller = AdaptiveQualityController::from_settings(&settings).unwrap();
    assert_eq!(controller.tier_index(), COMPETITION);
    assert!(!controller.is_enabled());
}

// ============================================================================
// Hysteresis Tests
// ============================================================================

#[test]
fn first_sample_only_sets_the_baseline() {
    let mut controller = controller_at(BROADCAST);
    let change = controller.record(PerformanceSample::new(100.0, 0.0));
    assert!(change.is_none(), "First sample must not move the tier");
    assert_eq!(controller.tier_index(), BROADCAST);
    assert_eq!(
        controller.last_sample(),
        Some(PerformanceSample::new(100.0, 0.0))
    );
}

#[test]
fn alternating_spikes_inside_window_are_ignored() {
    let mut controller = controller_at(BROADCAST);
    let mut t = 0.0;
    let mut spike = true;
    while t < 1990.0 {
        let frame_ms = if spike { 50.0 } else { 4.0 };
        assert!(
            controller
                .record(PerformanceSample::new(frame_ms, t))
                .is_none(),
            "Tier moved at t={t} inside the hysteresis window"
        );
        spike = !spike;
        t += 16.0;
    }
    assert_eq!(controller.tier_index(), BROADCAST);
}

#[test]
fn in_band_frame_times_hold_the_tier() {
    let mut controller = controller_at(BROADCAST);
    let changes = feed(&mut controller, 16.0, 0.0, 10_000.0);
    assert!(changes.is_empty(), "16ms is inside [0.8, 1.2] x budget");
    assert_eq!(controller.tier_index(), BROADCAST);
}

// ============================================================================
// Sustained Load Tests
// ============================================================================

#[test]
fn sustained_overload_drops_exactly_one_tier() {
    let mut controller = controller_at(BROADCAST);
    let budget = controller.budget_ms();

    // 1.5x budget for a little longer than one window.
    let changes = feed(&mut controller, budget * 1.5, 0.0, 2100.0);

    assert_eq!(changes.len(), 1, "Expected one step, got {changes:?}");
    assert_eq!(
        changes[0],
        TierChange {
            from: BROADCAST,
            to: COMPETITION,
            direction: Direction::Down,
        }
    );
    assert_eq!(controller.tier().name, "competition");
}

#[test]
fn broadcast_drops_to_competition_after_two_slow_seconds() {
    let mut controller = controller_at(BROADCAST);

    assert!(controller.record(PerformanceSample::new(30.0, 0.0)).is_none());
    let change = controller
        .record(PerformanceSample::new(30.0, 2000.0))
        .expect("30ms at 60fps must lower the tier");

    assert_eq!(change.direction, Direction::Down);
    let tier = controller.tier();
    assert_eq!(tier.name, "competition");
    assert_eq!(tier.ssr_steps, 16);
    assert_eq!(tier.ssr_binary_steps, 4);
    assert_eq!(tier.ssao_samples, 8);
    assert_eq!(tier.gi_samples, 4);
}

#[test]
fn headroom_raises_one_tier_per_window() {
    let mut controller = controller_at(DRAFT);

    let changes = feed(&mut controller, 5.0, 0.0, 4500.0);

    assert_eq!(changes.len(), 2, "Two windows elapsed: {changes:?}");
    assert!(changes.iter().all(|c| c.direction == Direction::Up));
    assert!(
        changes.iter().all(|c| c.to == c.from + 1),
        "Each change must be a single step"
    );
    assert_eq!(controller.tier_index(), BROADCAST);
}

#[test]
fn tier_never_leaves_the_ladder() {
    let mut slow = controller_at(DRAFT);
    assert!(feed(&mut slow, 100.0, 0.0, 20_000.0).is_empty());
    assert_eq!(slow.tier_index(), DRAFT);

    let mut fast = controller_at(CINEMATIC);
    assert!(feed(&mut fast, 1.0, 0.0, 20_000.0).is_empty());
    assert_eq!(fast.tier_index(), CINEMATIC);
}

// ============================================================================
// Host Control Tests
// ============================================================================

#[test]
fn disabled_controller_keeps_recording_but_never_moves() {
    let mut controller = controller_at(BROADCAST);
    controller.set_enabled(false);

    assert!(feed(&mut controller, 50.0, 0.0, 10_000.0).is_empty());
    assert_eq!(controller.tier_index(), BROADCAST);
    assert!(controller.last_sample().is_some());
}

#[test]
fn force_tier_jumps_and_restarts_the_window() {
    let mut controller = controller_at(BROADCAST);
    controller.record(PerformanceSample::new(16.0, 0.0));
    controller.record(PerformanceSample::new(16.0, 3000.0));

    let change = controller.force_tier("draft").unwrap().unwrap();
    assert_eq!(change.from, BROADCAST);
    assert_eq!(change.to, DRAFT);
    assert_eq!(change.direction, Direction::Down);

    // Window restarts at the last sample (3000ms).
    assert!(controller.record(PerformanceSample::new(5.0, 4000.0)).is_none());
    assert!(controller.record(PerformanceSample::new(5.0, 5000.0)).is_some());
}

#[test]
fn force_current_tier_is_a_no_op() {
    let mut controller = controller_at(BROADCAST);
    assert!(controller.force_tier("broadcast").unwrap().is_none());
}

#[test]
fn force_unknown_tier_fails() {
    let mut controller = controller_at(BROADCAST);
    let err = controller.force_tier("ultra").unwrap_err();
    assert!(matches!(err, SsfxError::InvalidSettings(_)));
    assert_eq!(controller.tier_index(), BROADCAST);
}
