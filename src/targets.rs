//! Render Target Manager
//!
//! Owns every offscreen buffer the effect pipeline reads or writes, and
//! reallocates them when the viewport changes size.
//!
//! # Target Set
//!
//! ```text
//! ┌──────────── full resolution ─────────────┐   ┌─ half resolution ─┐
//! │ color  depth  normal  motion  history    │   │        gi         │
//! │ ssr    ssao                              │   └───────────────────┘
//! └──────────────────────────────────────────┘
//! ```
//!
//! `history` holds the previous frame's composited colour and is what the GI
//! pass samples; see [`crate::pipeline`] for the ping-pong order.
//!
//! # Memory Strategy
//!
//! - Targets are created once per resolution and reused every frame.
//! - [`RenderTargetManager::resize`] with the current size is a no-op.
//! - A real resize releases the whole old set **before** creating the new one,
//!   so peak usage never holds both generations.
//! - Device targets are destroyed explicitly on release instead of waiting
//!   for the last handle to drop.
//! - Callers cannot hold a texture borrow across a resize: `resize` takes
//!   `&mut self` while [`target`](RenderTargetManager::target) hands out
//!   `&RenderTarget` tied to `&self`.
//!
//! # Residency
//!
//! A manager built with [`RenderTargetManager::with_device`] owns one
//! `wgpu::Texture` per target; one built with [`RenderTargetManager::new`]
//! keeps host texel buffers for the reference passes. Both report memory
//! from the formats and extents they actually allocated.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use glam::{UVec2, Vec4};
use rustc_hash::FxHashMap;

use crate::errors::{Result, SsfxError};
use crate::gpu::{DeviceTexture, GpuContext};
use crate::texture::{Texture, format_byte_size};

// ─── Target Names ─────────────────────────────────────────────────────────────

/// The fixed set of named render targets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TargetName {
    Color,
    Depth,
    Normal,
    Motion,
    Ssr,
    Ssao,
    Gi,
    History,
}

impl TargetName {
    pub const ALL: [TargetName; 8] = [
        Self::Color,
        Self::Depth,
        Self::Normal,
        Self::Motion,
        Self::Ssr,
        Self::Ssao,
        Self::Gi,
        Self::History,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Depth => "depth",
            Self::Normal => "normal",
            Self::Motion => "motion",
            Self::Ssr => "ssr",
            Self::Ssao => "ssao",
            Self::Gi => "gi",
            Self::History => "history",
        }
    }

    /// GPU format of the target.
    ///
    /// Depth is a colour-format copy of the scene depth (`R32Float`) so it
    /// can be uploaded, copied and read with `textureLoad`.
    #[must_use]
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Color | Self::Normal | Self::Ssr | Self::Gi | Self::History => {
                wgpu::TextureFormat::Rgba16Float
            }
            Self::Depth => wgpu::TextureFormat::R32Float,
            Self::Motion => wgpu::TextureFormat::Rg16Float,
            Self::Ssao => wgpu::TextureFormat::R8Unorm,
        }
    }

    /// Only GI is computed at reduced resolution.
    #[inline]
    #[must_use]
    pub fn is_half_resolution(self) -> bool {
        matches!(self, Self::Gi)
    }

    /// Value a freshly allocated target is cleared to.
    ///
    /// Depth clears to the far plane and SSAO to full visibility so a target
    /// that has never been written reads as "nothing here".
    #[must_use]
    pub fn clear_value(self) -> Vec4 {
        match self {
            Self::Depth | Self::Ssao => Vec4::ONE,
            _ => Vec4::ZERO,
        }
    }

    fn extent(self, width: u32, height: u32) -> UVec2 {
        if self.is_half_resolution() {
            UVec2::new((width / 2).max(1), (height / 2).max(1))
        } else {
            UVec2::new(width, height)
        }
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetName {
    type Err = SsfxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SsfxError::UnknownTarget(s.to_string()))
    }
}

// ─── Targets ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Storage {
    Host(Texture),
    Device(DeviceTexture),
}

/// One named render target, resident either on the host or on the GPU.
#[derive(Debug)]
pub struct RenderTarget {
    name: TargetName,
    size: UVec2,
    storage: Storage,
}

impl RenderTarget {
    #[inline]
    #[must_use]
    pub fn name(&self) -> TargetName {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.size.x
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.size.y
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.name.format()
    }

    #[must_use]
    pub fn byte_size(&self) -> u64 {
        format_byte_size(self.format(), self.size.x, self.size.y)
    }

    #[inline]
    #[must_use]
    pub fn is_device(&self) -> bool {
        matches!(self.storage, Storage::Device(_))
    }

    /// The host texel buffer, for host-resident targets.
    #[must_use]
    pub fn host(&self) -> Option<&Texture> {
        match &self.storage {
            Storage::Host(texture) => Some(texture),
            Storage::Device(_) => None,
        }
    }

    /// The GPU texture, for device-resident targets.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceTexture> {
        match &self.storage {
            Storage::Host(_) => None,
            Storage::Device(texture) => Some(texture),
        }
    }

    /// Shader-visible view of a device-resident target.
    #[must_use]
    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.device().map(DeviceTexture::view)
    }

    /// Current contents on the host. Device targets are read back, which
    /// waits for all submitted work.
    pub fn read(&self) -> Result<Cow<'_, Texture>> {
        match &self.storage {
            Storage::Host(texture) => Ok(Cow::Borrowed(texture)),
            Storage::Device(texture) => texture.read().map(Cow::Owned),
        }
    }

    fn write(&mut self, source: &Texture) -> Result<()> {
        match &mut self.storage {
            Storage::Host(texture) => {
                texture.copy_from(source);
                Ok(())
            }
            Storage::Device(texture) => texture.write(source),
        }
    }

    fn release(&self) {
        if let Storage::Device(texture) = &self.storage {
            texture.destroy();
        }
    }
}

// ─── Manager ──────────────────────────────────────────────────────────────────

/// Owner of the [`TargetName`] set.
pub struct RenderTargetManager {
    gpu: Option<GpuContext>,
    width: u32,
    height: u32,
    targets: FxHashMap<TargetName, RenderTarget>,
    /// Number of textures created over the manager's lifetime.
    total_allocations: u64,
    /// Number of textures released over the manager's lifetime.
    total_releases: u64,
}

impl RenderTargetManager {
    /// Allocates the full target set at `width × height` in host memory.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::create(None, width, height)
    }

    /// Allocates the full target set at `width × height` on the GPU.
    pub fn with_device(gpu: GpuContext, width: u32, height: u32) -> Result<Self> {
        Self::create(Some(gpu), width, height)
    }

    fn create(gpu: Option<GpuContext>, width: u32, height: u32) -> Result<Self> {
        let mut manager = Self {
            gpu,
            width: 0,
            height: 0,
            targets: FxHashMap::default(),
            total_allocations: 0,
            total_releases: 0,
        };
        manager.allocate(width, height)?;
        Ok(manager)
    }

    /// Creates (or reuses) every target at the given resolution.
    ///
    /// Returns `true` when textures were actually (re)created.
    pub fn allocate(&mut self, width: u32, height: u32) -> Result<bool> {
        if width == 0 || height == 0 {
            return Err(SsfxError::InvalidResolution { width, height });
        }

        if self.width == width && self.height == height && self.targets.len() == TargetName::ALL.len()
        {
            return Ok(false);
        }

        // Old generation goes first.
        self.release();

        for name in TargetName::ALL {
            let target = self.create_target(name, name.extent(width, height))?;
            self.targets.insert(name, target);
            self.total_allocations += 1;
        }

        self.width = width;
        self.height = height;

        log::debug!(
            "Allocated {} {} render targets at {width}x{height} ({} bytes)",
            self.targets.len(),
            if self.is_device() { "GPU" } else { "host" },
            self.allocated_bytes()
        );
        Ok(true)
    }

    fn create_target(&self, name: TargetName, size: UVec2) -> Result<RenderTarget> {
        let cleared = Texture::filled(name.as_str(), size.x, size.y, name.format(), name.clear_value());
        let storage = match &self.gpu {
            None => Storage::Host(cleared),
            Some(gpu) => {
                let texture = DeviceTexture::new(gpu, name.as_str(), size, name.format());
                texture.write(&cleared)?;
                Storage::Device(texture)
            }
        };
        Ok(RenderTarget { name, size, storage })
    }

    /// Reallocates for a new viewport size. Idempotent for an unchanged size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        let changed = self.allocate(width, height)?;
        if changed {
            log::info!("Render targets resized to {width}x{height}");
        }
        Ok(changed)
    }

    /// Drops every target.
    fn release(&mut self) {
        let released = self.targets.len() as u64;
        for target in self.targets.values() {
            target.release();
        }
        self.targets.clear();
        self.total_releases += released;
    }

    /// Looks up a target by its string name.
    pub fn get(&self, name: &str) -> Result<&RenderTarget> {
        let name = TargetName::from_str(name)?;
        Ok(self.target(name))
    }

    /// Borrows a target.
    #[must_use]
    pub fn target(&self, name: TargetName) -> &RenderTarget {
        // Every name is inserted by `allocate`, which construction always runs.
        &self.targets[&name]
    }

    fn target_mut(&mut self, name: TargetName) -> &mut RenderTarget {
        self.targets
            .get_mut(&name)
            .unwrap_or_else(|| unreachable!("target {name} is always allocated"))
    }

    /// Host texel buffer of a host-resident target.
    pub fn host_mut(&mut self, name: TargetName) -> Result<&mut Texture> {
        match &mut self.target_mut(name).storage {
            Storage::Host(texture) => Ok(texture),
            Storage::Device(_) => Err(SsfxError::WrongResidency(name)),
        }
    }

    /// Copies an externally produced texture into a target.
    pub fn upload(&mut self, name: TargetName, source: &Texture) -> Result<()> {
        let target = self.target_mut(name);
        if source.size() != target.size {
            return Err(SsfxError::SceneBufferSizeMismatch {
                target: name,
                actual_width: source.width(),
                actual_height: source.height(),
                expected_width: target.width(),
                expected_height: target.height(),
            });
        }
        target.write(source)
    }

    /// Replaces a host target's texels with a pass result.
    pub(crate) fn commit(&mut self, name: TargetName, texels: Vec<Vec4>) -> Result<()> {
        self.host_mut(name)?.commit(texels);
        Ok(())
    }

    /// Copies the current colour target into `history`.
    ///
    /// On the GPU the copy is submitted on its own; the pipeline records it
    /// into the frame's encoder with
    /// [`encode_history_copy`](Self::encode_history_copy) instead.
    pub fn store_history(&mut self) -> Result<()> {
        if let Some(gpu) = &self.gpu {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("History Copy"),
                });
            self.encode_history_copy(&mut encoder);
            gpu.queue.submit(Some(encoder.finish()));
            return Ok(());
        }
        let color = self.target(TargetName::Color).read()?.texels().to_vec();
        self.commit(TargetName::History, color)
    }

    /// Records the colour → history copy. No-op for host targets.
    pub fn encode_history_copy(&self, encoder: &mut wgpu::CommandEncoder) {
        if let (Some(color), Some(history)) = (
            self.target(TargetName::Color).device(),
            self.target(TargetName::History).device(),
        ) {
            history.encode_copy_from(encoder, color);
        }
    }

    /// The device context, for device-resident managers.
    #[inline]
    #[must_use]
    pub fn gpu(&self) -> Option<&GpuContext> {
        self.gpu.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_device(&self) -> bool {
        self.gpu.is_some()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Number of textures currently alive.
    #[inline]
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    #[inline]
    #[must_use]
    pub fn total_releases(&self) -> u64 {
        self.total_releases
    }

    /// Bytes held by all live targets.
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.targets.values().map(RenderTarget::byte_size).sum()
    }
}

impl Drop for RenderTargetManager {
    fn drop(&mut self) {
        if !self.targets.is_empty() {
            log::debug!("Releasing {} render targets", self.targets.len());
        }
        self.release();
    }
}
