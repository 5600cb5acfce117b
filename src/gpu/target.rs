use std::sync::mpsc;

use glam::UVec2;

use super::{GpuContext, padded_bytes_per_row};
use crate::errors::{Result, SsfxError};
use crate::texture::{Texture, texel_size};

/// A render target resident on the GPU.
#[derive(Debug)]
pub struct DeviceTexture {
    gpu: GpuContext,
    label: &'static str,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DeviceTexture {
    pub const USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
        .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
        .union(wgpu::TextureUsages::COPY_SRC)
        .union(wgpu::TextureUsages::COPY_DST);

    #[must_use]
    pub fn new(gpu: &GpuContext, label: &'static str, size: UVec2, format: wgpu::TextureFormat) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: Self::USAGE,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            gpu: gpu.clone(),
            label,
            texture,
            view,
        }
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.texture.width(), self.texture.height())
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    fn extent(&self) -> wgpu::Extent3d {
        self.texture.size()
    }

    fn copy_info(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }

    /// Queues a write of `source`, converted to this target's format.
    ///
    /// The caller checks that the sizes match.
    pub fn write(&self, source: &Texture) -> Result<()> {
        let format = self.format();
        let bytes = source.to_bytes(format)?;
        let size = self.size();
        self.gpu.queue.write_texture(
            self.copy_info(),
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.x * texel_size(format)? as u32),
                rows_per_image: Some(size.y),
            },
            self.extent(),
        );
        Ok(())
    }

    /// Records a full copy of `source` into this texture.
    pub fn encode_copy_from(&self, encoder: &mut wgpu::CommandEncoder, source: &DeviceTexture) {
        encoder.copy_texture_to_texture(source.copy_info(), self.copy_info(), self.extent());
    }

    /// Copies the texture back to the host and waits for it.
    pub fn read(&self) -> Result<Texture> {
        let format = self.format();
        let size = self.size();
        let texel_bytes = texel_size(format)? as u32;
        let unpadded = size.x * texel_bytes;
        let padded = padded_bytes_per_row(unpadded);

        let staging = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: u64::from(padded) * u64::from(size.y),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.copy_info(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.y),
                },
            },
            self.extent(),
        );
        self.gpu.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.gpu.wait_idle()?;
        rx.recv()
            .map_err(|e| SsfxError::Readback(e.to_string()))?
            .map_err(|e| SsfxError::Readback(e.to_string()))?;

        // Drop the row padding.
        let mut bytes = Vec::with_capacity((unpadded * size.y) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                bytes.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();

        Texture::from_bytes(self.label, size.x, size.y, format, &bytes)
    }

    /// Frees the GPU memory now instead of when the last handle drops.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}
