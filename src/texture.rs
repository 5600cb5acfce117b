//! Host-side texel buffers.
//!
//! A [`Texture`] is a 2D image of `Vec4` texels tagged with a
//! `wgpu::TextureFormat`. It is the exchange type between the host and the
//! pipeline: scene buffers arrive as textures, GPU targets are read back into
//! textures, and the host reference passes evaluate directly on them.
//! Single-channel formats keep their value in `.x`.
//!
//! [`Texture::to_bytes`] and [`Texture::from_bytes`] convert between `Vec4`
//! texels and the tightly packed byte layout of a GPU format.

use glam::{UVec2, Vec2, Vec4};
use half::f16;

use crate::errors::{Result, SsfxError};

/// A 2D texel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    label: &'static str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    texels: Vec<Vec4>,
}

impl Texture {
    /// Creates a zero-filled texture.
    #[must_use]
    pub fn new(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self::filled(label, width, height, format, Vec4::ZERO)
    }

    /// Creates a texture with every texel set to `value`.
    #[must_use]
    pub fn filled(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        value: Vec4,
    ) -> Self {
        Self {
            label,
            width,
            height,
            format,
            texels: vec![value; width as usize * height as usize],
        }
    }

    /// Wraps existing texel data.
    ///
    /// Fails with [`SsfxError::TexelCountMismatch`] unless
    /// `texels.len() == width * height`.
    pub fn from_texels(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        texels: Vec<Vec4>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(SsfxError::TexelCountMismatch {
                label,
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self {
            label,
            width,
            height,
            format,
            texels,
        })
    }

    /// Decodes tightly packed rows of `format` texels.
    pub fn from_bytes(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        bytes: &[u8],
    ) -> Result<Self> {
        let texel_bytes = texel_size(format)?;
        let texels = bytes
            .chunks_exact(texel_bytes)
            .map(|chunk| decode_texel(format, chunk))
            .collect();
        Self::from_texels(label, width, height, format, texels)
    }

    /// Encodes the texels as tightly packed rows of `format`.
    ///
    /// `format` may differ from [`format`](Self::format): scene buffers are
    /// converted to the format of the target they are uploaded into.
    pub fn to_bytes(&self, format: wgpu::TextureFormat) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.texels.len() * texel_size(format)?);
        for texel in &self.texels {
            encode_texel(format, *texel, &mut bytes);
        }
        Ok(bytes)
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    #[inline]
    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// GPU memory this texture occupies in its format.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        format_byte_size(self.format, self.width, self.height)
    }

    /// Fetches a texel by integer coordinate, clamped to the edge.
    ///
    /// An empty texture reads as zero.
    #[inline]
    #[must_use]
    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::ZERO;
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.texels[index] = value;
    }

    /// Nearest-neighbour sample with clamp-to-edge addressing.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::ZERO;
        }
        let px = uv * Vec2::new(self.width as f32, self.height as f32);
        let x = px.x.floor().clamp(0.0, (self.width - 1) as f32) as u32;
        let y = px.y.floor().clamp(0.0, (self.height - 1) as f32) as u32;
        self.load(x, y)
    }

    /// Centre UV of texel `(x, y)`.
    #[inline]
    #[must_use]
    pub fn texel_uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    /// Copies texel data from a texture of identical size.
    ///
    /// Returns `false` (and copies nothing) if the sizes differ.
    pub fn copy_from(&mut self, other: &Texture) -> bool {
        if self.size() != other.size() {
            return false;
        }
        self.texels.copy_from_slice(&other.texels);
        true
    }

    /// Replaces the texel data with the output of a fullscreen pass.
    pub(crate) fn commit(&mut self, texels: Vec<Vec4>) {
        debug_assert_eq!(texels.len(), self.texels.len());
        self.texels = texels;
    }
}

// ─── Format Codec ─────────────────────────────────────────────────────────────

/// Bytes of one `format` texel, for the formats the pipeline moves.
pub fn texel_size(format: wgpu::TextureFormat) -> Result<usize> {
    use wgpu::TextureFormat as F;
    match format {
        F::R8Unorm => Ok(1),
        F::Rg16Float | F::R32Float | F::Depth32Float | F::Rgba8Unorm => Ok(4),
        F::Rgba16Float => Ok(8),
        F::Rgba32Float => Ok(16),
        other => Err(SsfxError::UnsupportedFormat(other)),
    }
}

/// Bytes a `width × height` texture of `format` occupies.
#[must_use]
pub fn format_byte_size(format: wgpu::TextureFormat, width: u32, height: u32) -> u64 {
    let texel_bytes = format.block_copy_size(None).unwrap_or(16);
    u64::from(width) * u64::from(height) * u64::from(texel_bytes)
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn encode_texel(format: wgpu::TextureFormat, texel: Vec4, out: &mut Vec<u8>) {
    use wgpu::TextureFormat as F;
    let half = |v: f32| f16::from_f32(v).to_le_bytes();
    match format {
        F::R8Unorm => out.push(unorm8(texel.x)),
        F::Rgba8Unorm => out.extend(texel.to_array().map(unorm8)),
        F::R32Float | F::Depth32Float => out.extend_from_slice(&texel.x.to_le_bytes()),
        F::Rg16Float => {
            out.extend_from_slice(&half(texel.x));
            out.extend_from_slice(&half(texel.y));
        }
        F::Rgba16Float => {
            for c in texel.to_array() {
                out.extend_from_slice(&half(c));
            }
        }
        F::Rgba32Float => out.extend_from_slice(bytemuck::bytes_of(&texel)),
        // `texel_size` rejects everything else before encoding starts.
        _ => {}
    }
}

fn decode_texel(format: wgpu::TextureFormat, bytes: &[u8]) -> Vec4 {
    use wgpu::TextureFormat as F;
    let half = |i: usize| f16::from_le_bytes([bytes[i], bytes[i + 1]]).to_f32();
    let float = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    let unorm = |i: usize| f32::from(bytes[i]) / 255.0;
    match format {
        F::R8Unorm => Vec4::new(unorm(0), 0.0, 0.0, 1.0),
        F::Rgba8Unorm => Vec4::new(unorm(0), unorm(1), unorm(2), unorm(3)),
        F::R32Float | F::Depth32Float => Vec4::new(float(0), 0.0, 0.0, 1.0),
        F::Rg16Float => Vec4::new(half(0), half(2), 0.0, 1.0),
        F::Rgba16Float => Vec4::new(half(0), half(2), half(4), half(6)),
        F::Rgba32Float => Vec4::new(float(0), float(4), float(8), float(12)),
        _ => Vec4::ZERO,
    }
}
