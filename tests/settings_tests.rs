//! Settings and Quality Ladder Tests
//!
//! Tests for:
//! - PipelineSettings defaults and frame budget
//! - JSON loading with partial documents
//! - Validation failures
//! - QualityLadder ordering rules
//! - ShadowPrecision parsing and map sizes

use arena_ssfx::quality::{QualityLadder, QualityTier, ShadowPrecision};
use arena_ssfx::settings::PipelineSettings;
use arena_ssfx::SsfxError;

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn assert_invalid(result: arena_ssfx::Result<()>, what: &str) {
    assert!(
        matches!(result, Err(SsfxError::InvalidSettings(_))),
        "Expected InvalidSettings for {what}, got {result:?}"
    );
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn default_settings_are_valid() {
    let settings = PipelineSettings::default();
    settings.validate().unwrap();
    assert!(settings.adaptive);
    assert_eq!(settings.initial_tier, "broadcast");
    assert_eq!(settings.ladder.len(), 4);
}

#[test]
fn frame_budget_at_sixty_fps() {
    let settings = PipelineSettings::default();
    assert!(approx(settings.frame_budget_ms(), 16.667));
}

#[test]
fn default_ladder_is_ordered_cheapest_first() {
    let ladder = QualityLadder::default();
    let names: Vec<&str> = ladder.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["draft", "competition", "broadcast", "cinematic"]);

    for pair in ladder.tiers().windows(2) {
        assert!(
            pair[1].relative_cost() > pair[0].relative_cost(),
            "'{}' must cost more than '{}'",
            pair[1].name,
            pair[0].name
        );
    }
}

// ============================================================================
// JSON Loading
// ============================================================================

#[test]
fn partial_json_falls_back_to_defaults() {
    let settings = PipelineSettings::from_json_str(
        r#"{ "target_fps": 30.0, "initial_tier": "competition", "ssao": { "radius": 1.5 } }"#,
    )
    .unwrap();

    assert!(approx(settings.target_fps, 30.0));
    assert_eq!(settings.initial_tier, "competition");
    assert!(approx(settings.ssao.radius, 1.5));
    assert!(approx(settings.ssao.bias, 0.025), "Unset field keeps its default");
    assert!(settings.adaptive);
    assert_eq!(settings.ladder, QualityLadder::default());
}

#[test]
fn json_ladder_replaces_the_default() {
    let settings = PipelineSettings::from_json_str(
        r#"{
            "initial_tier": "lo",
            "ladder": [
                { "name": "lo", "ssr_steps": 4, "ssr_binary_steps": 1, "ssao_samples": 4,
                  "gi_samples": 2, "shadow_precision": "low" },
                { "name": "hi", "ssr_steps": 8, "ssr_binary_steps": 2, "ssao_samples": 8,
                  "gi_samples": 4, "shadow_precision": "high" }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(settings.ladder.len(), 2);
    assert_eq!(
        settings.ladder.get(1).unwrap().shadow_precision,
        ShadowPrecision::High
    );
}

#[test]
fn serialized_settings_load_back() -> anyhow::Result<()> {
    let mut settings = PipelineSettings {
        target_fps: 144.0,
        initial_tier: "draft".into(),
        ..Default::default()
    };
    settings.ssr.thickness = 0.2;

    let json = serde_json::to_string_pretty(&settings)?;
    let loaded = PipelineSettings::from_json_str(&json)?;

    assert_eq!(loaded, settings);
    Ok(())
}

#[test]
fn malformed_json_is_a_json_error() {
    let err = PipelineSettings::from_json_str("{ target_fps: }").unwrap_err();
    assert!(matches!(err, SsfxError::Json(_)), "Got {err:?}");
}

#[test]
fn json_with_unknown_initial_tier_fails_validation() {
    let err = PipelineSettings::from_json_str(r#"{ "initial_tier": "ultra" }"#).unwrap_err();
    assert!(matches!(err, SsfxError::InvalidSettings(_)), "Got {err:?}");
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn non_positive_target_fps_is_rejected() {
    for fps in [0.0, -30.0, f32::NAN] {
        let settings = PipelineSettings {
            target_fps: fps,
            ..Default::default()
        };
        assert_invalid(settings.validate(), "target_fps");
    }
}

#[test]
fn negative_hysteresis_is_rejected() {
    let settings = PipelineSettings {
        hysteresis_ms: -1.0,
        ..Default::default()
    };
    assert_invalid(settings.validate(), "hysteresis_ms");
}

#[test]
fn zero_radius_is_rejected() {
    let mut settings = PipelineSettings::default();
    settings.gi.radius = 0.0;
    assert_invalid(settings.validate(), "gi.radius");
}

#[test]
fn non_positive_ssao_exponent_is_rejected() {
    for intensity in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        let mut settings = PipelineSettings::default();
        settings.ssao.intensity = intensity;
        assert_invalid(settings.validate(), "ssao.intensity");
    }

    let mut settings = PipelineSettings::default();
    settings.ssao.intensity = 0.5;
    assert!(settings.validate().is_ok(), "A fractional exponent is valid");
}

#[test]
fn empty_ladder_is_rejected() {
    assert!(matches!(
        QualityLadder::new(Vec::new()),
        Err(SsfxError::InvalidSettings(_))
    ));
}

#[test]
fn ladder_must_ascend_in_cost() {
    let result = QualityLadder::new(vec![
        QualityTier::new("hi", 32, 8, 16, 8, ShadowPrecision::High),
        QualityTier::new("lo", 8, 2, 4, 2, ShadowPrecision::Low),
    ]);
    assert!(matches!(result, Err(SsfxError::InvalidSettings(_))));
}

#[test]
fn ladder_rejects_zero_counts_and_oversized_kernels() {
    let zero = QualityLadder::new(vec![QualityTier::new(
        "broken",
        0,
        0,
        4,
        2,
        ShadowPrecision::Low,
    )]);
    assert!(zero.is_err(), "Zero SSR steps must be rejected");

    let oversized = QualityLadder::new(vec![QualityTier::new(
        "greedy",
        8,
        2,
        128,
        2,
        ShadowPrecision::Low,
    )]);
    assert!(oversized.is_err(), "SSAO samples above the kernel size");
}

// ============================================================================
// Shadow Precision
// ============================================================================

#[test]
fn shadow_precision_parses_case_insensitively() {
    assert_eq!(
        "Medium".parse::<ShadowPrecision>().unwrap(),
        ShadowPrecision::Medium
    );
    assert_eq!(
        "ULTRA".parse::<ShadowPrecision>().unwrap(),
        ShadowPrecision::Ultra
    );
    assert!("extreme".parse::<ShadowPrecision>().is_err());
}

#[test]
fn shadow_map_size_doubles_per_step() {
    let sizes: Vec<u32> = [
        ShadowPrecision::Low,
        ShadowPrecision::Medium,
        ShadowPrecision::High,
        ShadowPrecision::Ultra,
    ]
    .into_iter()
    .map(ShadowPrecision::map_size)
    .collect();
    assert_eq!(sizes, [512, 1024, 2048, 4096]);
}

#[test]
fn tier_display_lists_counts() {
    let tier = QualityLadder::default().get(1).unwrap().to_string();
    assert_eq!(tier, "competition (16/4/8/4, shadows medium)");
}
