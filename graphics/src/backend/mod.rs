//! GPU device abstraction layer.
//!
//! The render graph never talks to a graphics API directly. Everything it
//! needs from the GPU goes through the narrow [`Device`] trait:
//!
//! - Resource creation and destruction ([`GpuResource`])
//! - Submission of recorded [`Command`]s
//!
//! # Available Devices
//!
//! - [`DummyDevice`]: No-op device for testing, tools and headless runs
//!
//! Real D3D12/Vulkan devices live outside this crate and implement the same
//! trait.

mod dummy;
mod error;

pub use dummy::DummyDevice;
pub use error::BackendError;

use crate::types::{BindFlags, ClearValue, ResourceDesc, ResourceFormat, ResourceKind};

/// Identifier of a device allocation.
///
/// Two [`GpuResource`] handles with the same id refer to the same GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl ResourceId {
    /// Create a resource id. Devices outside this crate use this to mint ids.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to a GPU resource created by a [`Device`].
///
/// The handle is cheap to clone; cloning does not duplicate GPU memory.
/// Ownership (who calls [`Device::destroy_resource`]) is tracked by the
/// holder, not by the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuResource {
    id: ResourceId,
    desc: ResourceDesc,
}

impl GpuResource {
    /// Create a handle. Called by device implementations.
    pub fn new(id: ResourceId, desc: ResourceDesc) -> Self {
        Self { id, desc }
    }

    /// Get the allocation id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the descriptor the resource was created with.
    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    /// Get the resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.desc.kind
    }

    /// Get the width (byte size for buffers).
    pub fn width(&self) -> u32 {
        self.desc.size.width
    }

    /// Get the height.
    pub fn height(&self) -> u32 {
        self.desc.size.height
    }

    /// Get the depth.
    pub fn depth(&self) -> u32 {
        self.desc.size.depth
    }

    /// Get the format.
    pub fn format(&self) -> ResourceFormat {
        self.desc.format
    }

    /// Get the bind flags.
    pub fn bind_flags(&self) -> BindFlags {
        self.desc.bind_flags
    }

    /// Get the debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.desc.label.as_deref()
    }
}

/// A GPU command recorded by a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Debug marker opening a pass scope.
    BeginPass(String),
    /// Debug marker closing a pass scope.
    EndPass,
    /// Clear a texture or buffer.
    Clear {
        /// Resource to clear.
        target: ResourceId,
        /// Clear value.
        value: ClearValue,
    },
    /// Copy a whole resource into another one.
    Copy {
        /// Copy source.
        src: ResourceId,
        /// Copy destination.
        dst: ResourceId,
    },
    /// Rasterize into the given targets, sampling the given inputs.
    Draw {
        /// Debug label of the draw.
        label: String,
        /// Resources read by the draw.
        inputs: Vec<ResourceId>,
        /// Render targets.
        targets: Vec<ResourceId>,
    },
    /// Dispatch a compute workload.
    Dispatch {
        /// Debug label of the dispatch.
        label: String,
        /// Thread group counts.
        groups: [u32; 3],
        /// Resources accessed by the dispatch.
        resources: Vec<ResourceId>,
    },
}

/// Trait implemented by GPU devices.
///
/// The device is owned by the [`EngineContext`](crate::EngineContext) and
/// borrowed by the graph through a
/// [`RenderContext`](crate::graph::RenderContext) for the duration of a
/// compile/execute call.
pub trait Device {
    /// Human readable device name.
    fn name(&self) -> &str;

    /// Create a resource.
    fn create_resource(&mut self, desc: &ResourceDesc) -> Result<GpuResource, BackendError>;

    /// Destroy a resource previously returned by [`Device::create_resource`].
    fn destroy_resource(&mut self, resource: &GpuResource);

    /// Submit recorded commands for execution.
    fn submit(&mut self, commands: Vec<Command>) -> Result<(), BackendError>;

    /// Block until all submitted work has completed.
    fn wait_idle(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}
