//! GPU Backend
//!
//! The device-side half of the pipeline: render targets as real
//! `wgpu::Texture`s and the three effect programs as fullscreen render
//! pipelines. One frame records SSAO, SSR, GI and the history copy into a
//! single command encoder and submits it once.
//!
//! ```text
//!  GpuContext ─┬─► DeviceTexture (per target, TEXTURE_BINDING | RENDER_ATTACHMENT | COPY_*)
//!              └─► DevicePass    (per effect: pipeline, bind layouts, uniform buffer)
//! ```
//!
//! The host passes in [`crate::passes`] evaluate the same kernels on the CPU
//! and serve as the reference implementation when no adapter is available.

mod pass;
mod target;

pub use pass::DevicePass;
pub use target::DeviceTexture;

use crate::errors::{Result, SsfxError};

/// Device and queue shared by every GPU resource of a pipeline.
#[derive(Clone, Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Wraps a device the host application already owns.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Requests a headless adapter and device, blocking the calling thread.
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::request_headless())
    }

    /// Async variant of [`headless`](Self::headless).
    pub async fn request_headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SsfxError::AdapterRequestFailed(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("arena-ssfx"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }

    /// Blocks until every submitted command buffer has finished.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| SsfxError::Readback(e.to_string()))
    }
}

/// Row pitch of a texture-to-buffer copy, rounded up to the copy alignment.
#[must_use]
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_rounds_up_to_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }
}
