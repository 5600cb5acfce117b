//! Render Target Manager Tests
//!
//! Tests for:
//! - Allocation: full-resolution set, half-resolution GI, clear values
//! - Lookup: string names, unknown names
//! - Resize: idempotence, release-before-allocate accounting, zero sizes
//! - Upload / history: size validation, colour → history copy
//! - Memory accounting from the formats actually allocated

use glam::{UVec2, Vec4};

use arena_ssfx::targets::{RenderTargetManager, TargetName};
use arena_ssfx::{SsfxError, Texture};

fn host(targets: &RenderTargetManager, name: TargetName) -> &Texture {
    targets
        .target(name)
        .host()
        .expect("host manager keeps host targets")
}

fn color_texture(width: u32, height: u32, value: Vec4) -> Texture {
    Texture::filled(
        "scene_color",
        width,
        height,
        wgpu::TextureFormat::Rgba16Float,
        value,
    )
}

// ============================================================================
// Allocation Tests
// ============================================================================

#[test]
fn allocate_creates_every_named_target() {
    let targets = RenderTargetManager::new(64, 32).unwrap();
    assert_eq!(targets.live_allocations(), TargetName::ALL.len());
    assert_eq!(targets.size(), UVec2::new(64, 32));
}

#[test]
fn all_targets_but_gi_are_full_resolution() {
    let targets = RenderTargetManager::new(64, 32).unwrap();
    for name in TargetName::ALL {
        let expected = if name == TargetName::Gi {
            UVec2::new(32, 16)
        } else {
            UVec2::new(64, 32)
        };
        assert_eq!(
            targets.target(name).size(),
            expected,
            "Target '{name}' has the wrong size"
        );
    }
}

#[test]
fn half_resolution_never_collapses_to_zero() {
    let targets = RenderTargetManager::new(1, 1).unwrap();
    assert_eq!(targets.target(TargetName::Gi).size(), UVec2::ONE);
}

#[test]
fn fresh_depth_and_ssao_read_as_empty() {
    let targets = RenderTargetManager::new(4, 4).unwrap();
    assert_eq!(host(&targets, TargetName::Depth).load(0, 0), Vec4::ONE);
    assert_eq!(host(&targets, TargetName::Ssao).load(3, 3), Vec4::ONE);
    assert_eq!(host(&targets, TargetName::Ssr).load(1, 2), Vec4::ZERO);
}

#[test]
fn targets_carry_their_gpu_formats() {
    let targets = RenderTargetManager::new(4, 4).unwrap();
    assert_eq!(
        targets.target(TargetName::Depth).format(),
        wgpu::TextureFormat::R32Float
    );
    assert_eq!(
        targets.target(TargetName::Ssao).format(),
        wgpu::TextureFormat::R8Unorm
    );
    assert!(!targets.is_device());
    assert!(targets.target(TargetName::Color).view().is_none());
}

#[test]
fn allocated_bytes_follow_target_formats() {
    let targets = RenderTargetManager::new(4, 4).unwrap();
    // 4 × Rgba16Float (8 B) + R32Float depth + Rg16Float motion (4 B each)
    // + R8Unorm ssao, all 4×4; GI is Rgba16Float at 2×2.
    let expected = 4 * 16 * 8 + 16 * 4 + 16 * 4 + 16 + 4 * 8;
    assert_eq!(targets.allocated_bytes(), expected);
    assert_eq!(targets.target(TargetName::Ssao).byte_size(), 16);
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn get_by_name_returns_the_target() {
    let targets = RenderTargetManager::new(8, 8).unwrap();
    let normal = targets.get("normal").unwrap();
    assert_eq!(normal.name(), TargetName::Normal);
    assert_eq!(normal.read().unwrap().label(), "normal");
}

#[test]
fn get_unknown_name_fails() {
    let targets = RenderTargetManager::new(8, 8).unwrap();
    let err = targets.get("bloom").unwrap_err();
    assert!(
        matches!(err, SsfxError::UnknownTarget(ref name) if name == "bloom"),
        "Expected UnknownTarget, got {err:?}"
    );
}

#[test]
fn target_names_round_trip_through_strings() {
    for name in TargetName::ALL {
        assert_eq!(name.as_str().parse::<TargetName>().unwrap(), name);
    }
}

// ============================================================================
// Resize Tests
// ============================================================================

#[test]
fn resize_with_same_size_is_idempotent() {
    let mut targets = RenderTargetManager::new(32, 32).unwrap();
    let allocations = targets.total_allocations();
    let bytes = targets.allocated_bytes();

    assert!(!targets.resize(32, 32).unwrap());
    assert!(!targets.resize(32, 32).unwrap());

    assert_eq!(targets.total_allocations(), allocations);
    assert_eq!(targets.total_releases(), 0);
    assert_eq!(targets.live_allocations(), TargetName::ALL.len());
    assert_eq!(targets.allocated_bytes(), bytes);
}

#[test]
fn resize_releases_the_old_generation() {
    let mut targets = RenderTargetManager::new(32, 32).unwrap();
    let small = targets.allocated_bytes();

    assert!(targets.resize(64, 64).unwrap());

    let set = TargetName::ALL.len() as u64;
    assert_eq!(targets.total_allocations(), 2 * set);
    assert_eq!(targets.total_releases(), set);
    assert_eq!(
        targets.total_allocations() - targets.total_releases(),
        targets.live_allocations() as u64,
        "Every allocation must be live or released"
    );
    assert_eq!(targets.allocated_bytes(), small * 4);
}

#[test]
fn resize_to_zero_is_rejected_and_keeps_targets() {
    let mut targets = RenderTargetManager::new(16, 16).unwrap();
    let err = targets.resize(0, 16).unwrap_err();
    assert!(matches!(
        err,
        SsfxError::InvalidResolution {
            width: 0,
            height: 16
        }
    ));
    assert_eq!(targets.size(), UVec2::new(16, 16));
    assert_eq!(targets.live_allocations(), TargetName::ALL.len());
}

#[test]
fn new_with_zero_size_fails() {
    assert!(RenderTargetManager::new(0, 0).is_err());
}

// ============================================================================
// Upload / History Tests
// ============================================================================

#[test]
fn upload_copies_matching_buffer() {
    let mut targets = RenderTargetManager::new(4, 4).unwrap();
    let red = color_texture(4, 4, Vec4::new(1.0, 0.0, 0.0, 1.0));
    targets.upload(TargetName::Color, &red).unwrap();
    assert_eq!(
        host(&targets, TargetName::Color).load(2, 2),
        Vec4::new(1.0, 0.0, 0.0, 1.0)
    );
}

#[test]
fn upload_with_wrong_size_fails() {
    let mut targets = RenderTargetManager::new(4, 4).unwrap();
    let wrong = color_texture(8, 4, Vec4::ONE);
    let err = targets.upload(TargetName::Color, &wrong).unwrap_err();
    assert!(matches!(
        err,
        SsfxError::SceneBufferSizeMismatch {
            target: TargetName::Color,
            actual_width: 8,
            expected_width: 4,
            ..
        }
    ));
    assert_eq!(host(&targets, TargetName::Color).load(0, 0), Vec4::ZERO);
}

#[test]
fn store_history_copies_current_color() {
    let mut targets = RenderTargetManager::new(4, 4).unwrap();
    let green = color_texture(4, 4, Vec4::new(0.0, 1.0, 0.0, 1.0));
    targets.upload(TargetName::Color, &green).unwrap();
    targets.store_history().unwrap();
    assert_eq!(
        host(&targets, TargetName::History).texels(),
        host(&targets, TargetName::Color).texels()
    );
}
