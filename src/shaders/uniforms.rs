//! Typed uniform keys and values.
//!
//! Every member of an effect program's `Params` block must map onto one of
//! the [`Uniform`] keys below; the key carries the WGSL member name, the
//! expected [`UniformKind`], and the registered default. A program that
//! declares a member outside this table is rejected at compile time.

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec2, Vec4};

use crate::quality::MAX_SSAO_SAMPLES;

/// Texels in the 4×4 SSAO rotation tile.
pub const NOISE_TILE_TEXELS: usize = 16;

/// Shape of a uniform value, as declared in WGSL.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UniformKind {
    F32,
    U32,
    Vec2,
    Vec4,
    Mat4,
    /// `array<vec4<f32>, N>`
    Vec4Array,
}

impl UniformKind {
    #[must_use]
    pub fn wgsl_name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::U32 => "u32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat4 => "mat4x4<f32>",
            Self::Vec4Array => "array<vec4<f32>>",
        }
    }
}

/// A uniform value held by a program's uniform table.
#[derive(Clone, PartialEq, Debug)]
pub enum UniformValue {
    F32(f32),
    U32(u32),
    Vec2(Vec2),
    Vec4(Vec4),
    Mat4(Mat4),
    Vec4Array(Vec<Vec4>),
}

impl UniformValue {
    #[must_use]
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::F32(_) => UniformKind::F32,
            Self::U32(_) => UniformKind::U32,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Mat4(_) => UniformKind::Mat4,
            Self::Vec4Array(_) => UniformKind::Vec4Array,
        }
    }

    /// Writes the value into a std140-compatible block at `offset`.
    ///
    /// Bytes past the end of `block` are dropped.
    pub(crate) fn write_into(&self, block: &mut [u8], offset: usize) {
        fn put(block: &mut [u8], offset: usize, bytes: &[u8]) {
            let end = (offset + bytes.len()).min(block.len());
            if offset < end {
                block[offset..end].copy_from_slice(&bytes[..end - offset]);
            }
        }

        match self {
            Self::F32(v) => put(block, offset, bytemuck::bytes_of(v)),
            Self::U32(v) => put(block, offset, bytemuck::bytes_of(v)),
            Self::Vec2(v) => put(block, offset, bytemuck::bytes_of(v)),
            Self::Vec4(v) => put(block, offset, bytemuck::bytes_of(v)),
            Self::Mat4(m) => put(block, offset, bytemuck::bytes_of(&m.to_cols_array())),
            Self::Vec4Array(values) => put(block, offset, bytemuck::cast_slice(values.as_slice())),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

macro_rules! define_uniforms {
    ( $( $variant:ident => $wgsl:literal : $kind:ident = $default:expr ),* $(,)? ) => {
        /// Typed key of a uniform member.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Uniform {
            $( $variant, )*
        }

        impl Uniform {
            pub const ALL: &'static [Uniform] = &[ $( Uniform::$variant, )* ];

            /// WGSL member name inside the `Params` block.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $( Uniform::$variant => $wgsl, )*
                }
            }

            #[must_use]
            pub fn kind(self) -> UniformKind {
                match self {
                    $( Uniform::$variant => UniformKind::$kind, )*
                }
            }

            /// The registered default.
            #[must_use]
            pub fn default_value(self) -> UniformValue {
                match self {
                    $( Uniform::$variant => $default, )*
                }
            }
        }
    };
}

define_uniforms! {
    // Frame
    Projection        => "projection"        : Mat4 = UniformValue::Mat4(Mat4::IDENTITY),
    InverseProjection => "inv_projection"    : Mat4 = UniformValue::Mat4(Mat4::IDENTITY),
    View              => "view"              : Mat4 = UniformValue::Mat4(Mat4::IDENTITY),
    Resolution        => "resolution"        : Vec4 = UniformValue::Vec4(Vec4::new(1.0, 1.0, 1.0, 1.0)),
    Near              => "near"              : F32  = UniformValue::F32(0.1),
    Far               => "far"               : F32  = UniformValue::F32(1000.0),
    Time              => "time"              : F32  = UniformValue::F32(0.0),

    // Reflections
    SsrSteps          => "ssr_steps"         : U32  = UniformValue::U32(32),
    SsrBinarySteps    => "ssr_binary_steps"  : U32  = UniformValue::U32(8),
    SsrMaxDistance    => "ssr_max_distance"  : F32  = UniformValue::F32(20.0),
    SsrThickness      => "ssr_thickness"     : F32  = UniformValue::F32(0.5),
    SsrFresnelPower   => "ssr_fresnel_power" : F32  = UniformValue::F32(2.0),
    SsrEdgeFade       => "ssr_edge_fade"     : F32  = UniformValue::F32(0.1),
    SsrIntensity      => "ssr_intensity"     : F32  = UniformValue::F32(1.0),

    // Ambient occlusion
    SsaoSamples       => "ssao_samples"      : U32  = UniformValue::U32(16),
    SsaoRadius        => "ssao_radius"       : F32  = UniformValue::F32(0.5),
    SsaoBias          => "ssao_bias"         : F32  = UniformValue::F32(0.025),
    SsaoIntensity     => "ssao_intensity"    : F32  = UniformValue::F32(1.0),
    SsaoKernel        => "kernel"            : Vec4Array =
        UniformValue::Vec4Array(vec![Vec4::ZERO; MAX_SSAO_SAMPLES as usize]),
    SsaoNoise         => "noise"             : Vec4Array =
        UniformValue::Vec4Array(vec![Vec4::X; NOISE_TILE_TEXELS]),

    // Indirect lighting
    GiSamples         => "gi_samples"        : U32  = UniformValue::U32(8),
    GiRadius          => "gi_radius"         : F32  = UniformValue::F32(2.0),
    GiIntensity       => "gi_intensity"      : F32  = UniformValue::F32(1.0),
}

impl fmt::Display for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Uniform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|u| u.name() == s).ok_or(())
    }
}
