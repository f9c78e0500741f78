//! Resource formats and bind flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Resource format enumeration.
///
/// [`ResourceFormat::Unknown`] is only meaningful inside a pass reflection: it
/// asks the compiler to inherit the format from the connected producer, or to
/// fall back to the graph's default format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceFormat {
    /// Format is decided by the graph compiler.
    #[default]
    Unknown,

    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,
    /// 32-bit RG channels, unsigned integer.
    Rg32Uint,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 32-bit RGBA channels, unsigned integer.
    Rgba32Uint,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl ResourceFormat {
    /// Returns true if the format still has to be resolved by the compiler.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns the size in bytes per pixel, or 0 for [`ResourceFormat::Unknown`].
    pub fn block_size(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R8Unorm => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Rg32Uint => 8,
            Self::Rgba32Float | Self::Rgba32Uint => 16,
        }
    }
}

bitflags! {
    /// How a resource may be bound to the pipeline.
    ///
    /// The effective flags of a graph resource are the union of the flags of
    /// every field that references it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        /// Sampled or read in a shader.
        const SHADER_RESOURCE = 1 << 0;
        /// Written as a color render target.
        const RENDER_TARGET = 1 << 1;
        /// Read/write storage access.
        const UNORDERED_ACCESS = 1 << 2;
        /// Depth/stencil attachment.
        const DEPTH_STENCIL = 1 << 3;
        /// Source of a copy operation.
        const COPY_SOURCE = 1 << 4;
        /// Destination of a copy operation.
        const COPY_DEST = 1 << 5;
        /// Constant/uniform buffer.
        const CONSTANT = 1 << 6;
        /// Vertex buffer.
        const VERTEX = 1 << 7;
        /// Index buffer.
        const INDEX = 1 << 8;
        /// Indirect argument buffer.
        const INDIRECT = 1 << 9;
    }
}

impl Default for BindFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Kind of GPU resource described by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceKind {
    /// 2D texture (optionally arrayed or multisampled).
    #[default]
    Texture2D,
    /// Volume texture.
    Texture3D,
    /// Cube map.
    TextureCube,
    /// Structured or raw buffer.
    Buffer,
}

impl ResourceKind {
    /// Returns true for every texture kind.
    pub fn is_texture(&self) -> bool {
        !matches!(self, Self::Buffer)
    }
}
