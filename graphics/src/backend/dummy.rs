//! Dummy GPU device for testing and development.
//!
//! This device doesn't perform actual GPU operations but provides a valid
//! implementation of [`Device`] for testing the render graph without
//! requiring GPU hardware. It keeps track of live allocations and records
//! every submitted command so tests can inspect them.

use std::collections::HashMap;

use crate::types::{ResourceDesc, ResourceFormat, ResourceKind};

use super::{BackendError, Command, Device, GpuResource, ResourceId};

/// Default maximum texture dimension, matching common desktop limits.
const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Dummy GPU device.
#[derive(Debug)]
pub struct DummyDevice {
    next_id: u64,
    live: HashMap<ResourceId, ResourceDesc>,
    created: usize,
    destroyed: usize,
    submitted: Vec<Command>,
    max_dimension: u32,
    unsupported_formats: Vec<ResourceFormat>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live: HashMap::new(),
            created: 0,
            destroyed: 0,
            submitted: Vec::new(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            unsupported_formats: Vec::new(),
        }
    }

    /// Limit the largest texture dimension the device accepts.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Reject resources created with `format`.
    pub fn with_unsupported_format(mut self, format: ResourceFormat) -> Self {
        self.unsupported_formats.push(format);
        self
    }

    /// Number of resources currently alive.
    pub fn live_resource_count(&self) -> usize {
        self.live.len()
    }

    /// Total number of successful resource creations.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Total number of resource destructions.
    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    /// Check whether an allocation is still alive.
    pub fn is_live(&self, id: ResourceId) -> bool {
        self.live.contains_key(&id)
    }

    /// All commands submitted so far, in submission order.
    pub fn submitted_commands(&self) -> &[Command] {
        &self.submitted
    }

    /// Forget the recorded command history.
    pub fn clear_submitted(&mut self) {
        self.submitted.clear();
    }

    fn validate(&self, desc: &ResourceDesc) -> Result<(), BackendError> {
        let size = desc.size;
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(BackendError::InvalidParameter(format!(
                "{:?} has a zero dimension ({}x{}x{})",
                desc.label, size.width, size.height, size.depth
            )));
        }

        if desc.kind.is_texture() {
            if desc.format.is_unknown() {
                return Err(BackendError::InvalidParameter(format!(
                    "{:?} has no format",
                    desc.label
                )));
            }
            let largest = size.width.max(size.height).max(size.depth);
            if largest > self.max_dimension {
                return Err(BackendError::ResourceCreationFailed(format!(
                    "{:?} exceeds the maximum dimension {} ({}x{}x{})",
                    desc.label, self.max_dimension, size.width, size.height, size.depth
                )));
            }
        }

        if desc.kind != ResourceKind::Buffer && self.unsupported_formats.contains(&desc.format) {
            return Err(BackendError::FeatureNotSupported(format!(
                "format {:?}",
                desc.format
            )));
        }

        Ok(())
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for DummyDevice {
    fn name(&self) -> &str {
        "Dummy Device"
    }

    fn create_resource(&mut self, desc: &ResourceDesc) -> Result<GpuResource, BackendError> {
        self.validate(desc)?;

        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.live.insert(id, desc.clone());

        log::trace!(
            "DummyDevice: creating {:?} {:?} ({}x{}x{}, {:?})",
            desc.kind,
            desc.label,
            desc.size.width,
            desc.size.height,
            desc.size.depth,
            desc.format
        );

        Ok(GpuResource::new(id, desc.clone()))
    }

    fn destroy_resource(&mut self, resource: &GpuResource) {
        if self.live.remove(&resource.id()).is_some() {
            self.destroyed += 1;
            log::trace!("DummyDevice: destroying {:?}", resource.label());
        } else {
            log::warn!(
                "DummyDevice: destroy of unknown resource {:?} ({:?})",
                resource.id(),
                resource.label()
            );
        }
    }

    fn submit(&mut self, commands: Vec<Command>) -> Result<(), BackendError> {
        log::trace!("DummyDevice: submitting {} commands", commands.len());
        self.submitted.extend(commands);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BindFlags;

    fn color_target(width: u32, height: u32) -> ResourceDesc {
        ResourceDesc::texture_2d(width, height, ResourceFormat::Rgba8Unorm, BindFlags::RENDER_TARGET)
            .with_label("test.color")
    }

    #[test]
    fn test_create_and_destroy() {
        let mut device = DummyDevice::new();
        let res = device.create_resource(&color_target(64, 32)).unwrap();
        assert_eq!(res.width(), 64);
        assert_eq!(res.height(), 32);
        assert!(device.is_live(res.id()));
        assert_eq!(device.live_resource_count(), 1);

        device.destroy_resource(&res);
        assert!(!device.is_live(res.id()));
        assert_eq!(device.destroyed_count(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut device = DummyDevice::new();
        let a = device.create_resource(&color_target(8, 8)).unwrap();
        let b = device.create_resource(&color_target(8, 8)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_rejects_zero_size() {
        let mut device = DummyDevice::new();
        let result = device.create_resource(&color_target(0, 32));
        assert!(matches!(result, Err(BackendError::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_oversized() {
        let mut device = DummyDevice::new().with_max_dimension(128);
        let result = device.create_resource(&color_target(256, 32));
        assert!(matches!(result, Err(BackendError::ResourceCreationFailed(_))));
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let mut device = DummyDevice::new().with_unsupported_format(ResourceFormat::Rgba8Unorm);
        let result = device.create_resource(&color_target(16, 16));
        assert!(matches!(result, Err(BackendError::FeatureNotSupported(_))));
    }

    #[test]
    fn test_buffers_need_no_format() {
        let mut device = DummyDevice::new();
        let buf = device
            .create_resource(&ResourceDesc::buffer(1024, BindFlags::UNORDERED_ACCESS))
            .unwrap();
        assert_eq!(buf.width(), 1024);
    }

    #[test]
    fn test_submit_records_commands() {
        let mut device = DummyDevice::new();
        device
            .submit(vec![Command::BeginPass("a".into()), Command::EndPass])
            .unwrap();
        assert_eq!(device.submitted_commands().len(), 2);
        device.clear_submitted();
        assert!(device.submitted_commands().is_empty());
    }
}
