//! Fully resolved resource descriptors.

use super::{BindFlags, Extent3d, ResourceFormat, ResourceKind};

/// Descriptor for creating a GPU resource.
///
/// Unlike a reflection field, every property here is concrete: the graph
/// compiler resolves sizes and formats before a descriptor is handed to the
/// device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    /// Debug label, normally the `pass.field` name of the resource.
    pub label: Option<String>,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Size of the resource. Buffers use `width` as byte size.
    pub size: Extent3d,
    /// Array layer count.
    pub array_size: u32,
    /// Mip level count.
    pub mip_levels: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Resource format. Always [`ResourceFormat::Unknown`] for buffers.
    pub format: ResourceFormat,
    /// Bind flags.
    pub bind_flags: BindFlags,
}

impl ResourceDesc {
    /// Create a new 2D texture descriptor.
    pub fn texture_2d(width: u32, height: u32, format: ResourceFormat, bind_flags: BindFlags) -> Self {
        Self {
            label: None,
            kind: ResourceKind::Texture2D,
            size: Extent3d::new_2d(width, height),
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format,
            bind_flags,
        }
    }

    /// Create a new buffer descriptor.
    pub fn buffer(byte_size: u32, bind_flags: BindFlags) -> Self {
        Self {
            label: None,
            kind: ResourceKind::Buffer,
            size: Extent3d::new_2d(byte_size, 1),
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format: ResourceFormat::Unknown,
            bind_flags,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns true if both descriptors would create interchangeable resources.
    ///
    /// Labels are ignored.
    pub fn is_compatible(&self, other: &ResourceDesc) -> bool {
        self.kind == other.kind
            && self.size == other.size
            && self.array_size == other.array_size
            && self.mip_levels == other.mip_levels
            && self.sample_count == other.sample_count
            && self.format == other.format
            && self.bind_flags == other.bind_flags
    }

    /// Approximate memory footprint in bytes.
    pub fn byte_size(&self) -> u64 {
        let texels = self.size.width as u64 * self.size.height as u64 * self.size.depth as u64;
        match self.kind {
            ResourceKind::Buffer => self.size.width as u64,
            _ => {
                texels
                    * self.array_size as u64
                    * self.sample_count as u64
                    * self.format.block_size() as u64
            }
        }
    }
}

impl Default for ResourceDesc {
    fn default() -> Self {
        Self::texture_2d(0, 0, ResourceFormat::Unknown, BindFlags::empty())
    }
}
