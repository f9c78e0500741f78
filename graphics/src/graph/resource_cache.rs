//! Resource records and device allocations of a render graph.
//!
//! The cache is an arena of resource records indexed by [`ResourceHandle`].
//! Every `"pass.field"` name the compiler registers maps to a handle; fields
//! connected by an edge map to the same handle and their descriptors are
//! merged. The cache is the sole owner of graph-created device resources;
//! passes only see borrowed [`GpuResource`] handles for the current frame.
//!
//! Compilation fills the records without touching the device. Allocation
//! happens on the next execute:
//!
//! 1. Records are grouped into allocation slots. With transient aliasing
//!    enabled, records with identical descriptors and disjoint lifetimes
//!    share a slot, unless they are persistent, marked outputs or external.
//! 2. Each slot reuses the previous allocation of the same name when its
//!    descriptor is unchanged, otherwise a new resource is created.
//! 3. Allocations no slot claimed are destroyed.

use std::collections::HashMap;

use crate::backend::{Device, GpuResource};
use crate::error::{GraphError, GraphResult};
use crate::types::{Extent2d, ResourceDesc, ResourceFormat};

use super::reflection::{Field, FieldBuilder, Visibility};

/// Index of a resource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in the record arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Range of execution-order time points during which a resource is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub first: usize,
    pub last: usize,
}

impl Lifetime {
    fn at(time: usize) -> Self {
        Self {
            first: time,
            last: time,
        }
    }

    fn extend(&mut self, time: usize) {
        self.first = self.first.min(time);
        self.last = self.last.max(time);
    }

    /// Returns true if both ranges share a time point.
    pub fn overlaps(&self, other: &Lifetime) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

#[derive(Debug, Clone)]
struct ResourceRecord {
    name: String,
    aliases: Vec<String>,
    field: Field,
    lifetime: Lifetime,
    external: Option<GpuResource>,
    is_output: bool,
    desc: Option<ResourceDesc>,
    slot: Option<usize>,
}

#[derive(Debug, Clone)]
struct AllocationSlot {
    key: String,
    desc: ResourceDesc,
    members: Vec<ResourceHandle>,
    last: usize,
    shareable: bool,
}

/// Owner of the graph's resource records and device allocations.
#[derive(Debug, Default)]
pub struct ResourceCache {
    records: Vec<ResourceRecord>,
    names: HashMap<String, ResourceHandle>,
    external: HashMap<String, GpuResource>,
    slots: Vec<AllocationSlot>,
    bound: Vec<Option<GpuResource>>,
    allocations: HashMap<String, GpuResource>,
    needs_allocation: bool,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // External resources
    // ========================================================================

    /// Bind (or with `None`, unbind) a caller-owned resource to `"pass.field"`.
    ///
    /// External resources are never created or destroyed by the cache.
    pub fn set_external(&mut self, name: &str, resource: Option<GpuResource>) {
        match resource {
            Some(resource) => {
                self.external.insert(name.to_owned(), resource);
            }
            None => {
                self.external.remove(name);
            }
        }
    }

    /// The external resource bound to `name`.
    pub fn external(&self, name: &str) -> Option<&GpuResource> {
        self.external.get(name)
    }

    /// Names of all bound external resources, sorted.
    pub fn external_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.external.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Drop every external binding of a pass.
    pub(crate) fn remove_externals_of(&mut self, pass: &str) {
        self.external
            .retain(|name, _| name.split_once('.').map(|(p, _)| p) != Some(pass));
    }

    // ========================================================================
    // Compilation
    // ========================================================================

    /// An empty cache carrying over the external bindings, used to build a
    /// new set of records without disturbing the current one.
    pub(crate) fn staged(&self) -> Self {
        Self {
            external: self.external.clone(),
            ..Self::default()
        }
    }

    /// Take over the records of a successfully compiled staging cache,
    /// keeping the current device allocations for reuse.
    pub(crate) fn adopt(&mut self, staged: ResourceCache) {
        self.records = staged.records;
        self.names = staged.names;
        self.slots = staged.slots;
        self.bound = vec![None; self.slots.len()];
        self.needs_allocation = true;
    }

    /// Register a field used at execution time point `time`.
    ///
    /// With `alias`, the field is merged into the record of that name (its
    /// producer); otherwise it gets a record of its own, or merges into an
    /// existing record of the same name.
    pub fn register_field(
        &mut self,
        name: &str,
        field: &Field,
        time: usize,
        alias: Option<&str>,
    ) -> GraphResult<ResourceHandle> {
        let existing = match alias {
            Some(src) => Some(*self.names.get(src).ok_or_else(|| GraphError::FieldConflict {
                resource: src.to_owned(),
                reason: format!("'{name}' reads from '{src}' which has no resource"),
            })?),
            None => self.names.get(name).copied(),
        };

        let handle = match existing {
            Some(handle) => {
                let record = &mut self.records[handle.index()];
                record
                    .field
                    .merge(field)
                    .map_err(|reason| GraphError::FieldConflict {
                        resource: record.name.clone(),
                        reason,
                    })?;
                record.lifetime.extend(time);
                if record.name != name && !record.aliases.iter().any(|a| a == name) {
                    record.aliases.push(name.to_owned());
                }
                handle
            }
            None => {
                let handle = ResourceHandle::new(self.records.len());
                self.records.push(ResourceRecord {
                    name: name.to_owned(),
                    aliases: Vec::new(),
                    field: field.clone(),
                    lifetime: Lifetime::at(time),
                    external: None,
                    is_output: false,
                    desc: None,
                    slot: None,
                });
                handle
            }
        };

        self.names.insert(name.to_owned(), handle);
        Ok(handle)
    }

    /// Register a field backed by the external resource bound to `name`.
    pub fn register_external(&mut self, name: &str, field: &Field, time: usize) -> GraphResult<ResourceHandle> {
        let resource = self
            .external
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnresolvedInput {
                pass: name.split_once('.').map(|(p, _)| p).unwrap_or(name).to_owned(),
                field: name.split_once('.').map(|(_, f)| f).unwrap_or(name).to_owned(),
            })?;

        field
            .accepts(resource.desc())
            .map_err(|reason| GraphError::FieldConflict {
                resource: name.to_owned(),
                reason,
            })?;

        let mut backing = Field::from_resource_desc(field.name(), field.visibility(), resource.desc());
        FieldBuilder::new(&mut backing).bind_flags(resource.bind_flags() | field.bind_flags());

        let handle = ResourceHandle::new(self.records.len());
        self.records.push(ResourceRecord {
            name: name.to_owned(),
            aliases: Vec::new(),
            field: backing,
            lifetime: Lifetime::at(time),
            external: Some(resource),
            is_output: false,
            desc: None,
            slot: None,
        });
        self.names.insert(name.to_owned(), handle);
        Ok(handle)
    }

    /// Mark the resource behind `name` as a graph output.
    pub fn mark_output(&mut self, name: &str) -> bool {
        match self.names.get(name) {
            Some(handle) => {
                self.records[handle.index()].is_output = true;
                true
            }
            None => false,
        }
    }

    /// Compute the concrete descriptor of every record.
    pub fn resolve(&mut self, default_dims: Extent2d, default_format: ResourceFormat) {
        for record in &mut self.records {
            let desc = match &record.external {
                Some(resource) => resource.desc().clone(),
                None => record
                    .field
                    .resolve_desc(default_dims, default_format)
                    .with_label(record.name.clone()),
            };
            record.desc = Some(desc);
        }
    }

    /// Group records into allocation slots.
    ///
    /// Marked outputs are extended to `frame_end`. Must run after
    /// [`resolve`](Self::resolve).
    pub fn compute_aliasing(&mut self, enabled: bool, frame_end: usize) {
        self.slots.clear();

        for record in &mut self.records {
            record.slot = None;
            if record.is_output {
                record.lifetime.last = record.lifetime.last.max(frame_end);
            }
        }

        let mut order: Vec<usize> = (0..self.records.len())
            .filter(|&i| self.records[i].external.is_none())
            .collect();
        order.sort_by_key(|&i| (self.records[i].lifetime.first, i));

        for index in order {
            let record = &self.records[index];
            let Some(desc) = record.desc.as_ref() else {
                continue;
            };
            let shareable = enabled && !record.field.is_persistent() && !record.is_output;

            let reuse = if shareable {
                self.slots.iter().position(|slot| {
                    slot.shareable && slot.last < record.lifetime.first && slot.desc.is_compatible(desc)
                })
            } else {
                None
            };

            let slot_index = match reuse {
                Some(slot_index) => {
                    let slot = &mut self.slots[slot_index];
                    slot.members.push(ResourceHandle::new(index));
                    slot.last = record.lifetime.last;
                    log::trace!("Aliasing '{}' with '{}'", record.name, slot.key);
                    slot_index
                }
                None => {
                    self.slots.push(AllocationSlot {
                        key: record.name.clone(),
                        desc: desc.clone(),
                        members: vec![ResourceHandle::new(index)],
                        last: record.lifetime.last,
                        shareable,
                    });
                    self.slots.len() - 1
                }
            };
            self.records[index].slot = Some(slot_index);
        }

        self.bound = vec![None; self.slots.len()];
        self.needs_allocation = true;
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Create or reuse the device resources of every slot.
    ///
    /// Does nothing if the records did not change since the last successful
    /// allocation.
    pub fn allocate(&mut self, device: &mut dyn Device) -> GraphResult<()> {
        if !self.needs_allocation {
            return Ok(());
        }

        let mut previous = std::mem::take(&mut self.allocations);
        let mut next = HashMap::with_capacity(self.slots.len());
        let mut created = 0usize;

        for (index, slot) in self.slots.iter().enumerate() {
            let resource = match previous.remove(&slot.key) {
                Some(resource) if resource.desc().is_compatible(&slot.desc) => resource,
                stale => {
                    if let Some(stale) = stale {
                        log::debug!("Reallocating '{}', its descriptor changed", slot.key);
                        device.destroy_resource(&stale);
                    }
                    match device.create_resource(&slot.desc) {
                        Ok(resource) => {
                            created += 1;
                            log::trace!(
                                "Allocated '{}' ({}x{}x{}, {:?})",
                                slot.key,
                                slot.desc.size.width,
                                slot.desc.size.height,
                                slot.desc.size.depth,
                                slot.desc.format
                            );
                            resource
                        }
                        Err(source) => {
                            // Keep every live allocation tracked so nothing leaks.
                            previous.extend(next);
                            self.allocations = previous;
                            self.bound.iter_mut().for_each(|b| *b = None);
                            return Err(GraphError::Allocation {
                                resource: slot.key.clone(),
                                source,
                            });
                        }
                    }
                }
            };
            self.bound[index] = Some(resource.clone());
            next.insert(slot.key.clone(), resource);
        }

        for (name, unused) in previous {
            log::trace!("Destroying unused resource '{name}'");
            device.destroy_resource(&unused);
        }

        log::debug!(
            "Resource allocation: {} slots for {} resources, {} created",
            self.slots.len(),
            self.records.len(),
            created
        );

        self.allocations = next;
        self.needs_allocation = false;
        Ok(())
    }

    /// Destroy every graph-owned allocation. External resources are untouched.
    pub fn release_all(&mut self, device: &mut dyn Device) {
        for (_, resource) in self.allocations.drain() {
            device.destroy_resource(&resource);
        }
        self.bound.iter_mut().for_each(|b| *b = None);
        self.needs_allocation = true;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Handle of the record `name` maps to.
    pub fn handle(&self, name: &str) -> Option<ResourceHandle> {
        self.names.get(name).copied()
    }

    /// Current resource bound to `name`.
    pub fn get(&self, name: &str) -> Option<&GpuResource> {
        self.handle(name).and_then(|h| self.resource(h))
    }

    /// Current resource of a record.
    pub fn resource(&self, handle: ResourceHandle) -> Option<&GpuResource> {
        let record = self.records.get(handle.index())?;
        match &record.external {
            Some(resource) => Some(resource),
            None => record.slot.and_then(|slot| self.bound.get(slot)?.as_ref()),
        }
    }

    /// Merged field descriptor of a record.
    pub fn field(&self, handle: ResourceHandle) -> Option<&Field> {
        self.records.get(handle.index()).map(|r| &r.field)
    }

    /// Merged field descriptor of the record behind `name`, if registered.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.handle(name).and_then(|h| self.field(h))
    }

    /// Resolved descriptor of a record.
    pub fn desc(&self, handle: ResourceHandle) -> Option<&ResourceDesc> {
        self.records.get(handle.index())?.desc.as_ref()
    }

    pub fn lifetime(&self, handle: ResourceHandle) -> Option<Lifetime> {
        self.records.get(handle.index()).map(|r| r.lifetime)
    }

    /// Canonical name of a record (the first field registered for it).
    pub fn name(&self, handle: ResourceHandle) -> Option<&str> {
        self.records.get(handle.index()).map(|r| r.name.as_str())
    }

    /// Every name mapping to a record, canonical name first.
    pub fn names_of(&self, handle: ResourceHandle) -> Vec<&str> {
        self.records
            .get(handle.index())
            .map(|r| {
                std::iter::once(r.name.as_str())
                    .chain(r.aliases.iter().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_external(&self, handle: ResourceHandle) -> bool {
        self.records
            .get(handle.index())
            .is_some_and(|r| r.external.is_some())
    }

    /// Returns true if both names are backed by the same allocation slot.
    pub fn shares_allocation(&self, a: &str, b: &str) -> bool {
        let slot_of = |name: &str| {
            self.handle(name)
                .and_then(|h| self.records[h.index()].slot)
        };
        matches!((slot_of(a), slot_of(b)), (Some(x), Some(y)) if x == y)
    }

    /// Number of resource records.
    pub fn resource_count(&self) -> usize {
        self.records.len()
    }

    /// Number of allocation slots of the current records.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of live device allocations owned by the cache.
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Resolved descriptor of the record behind `name`, presented as the
    /// field `field_name` of a pass.
    pub(crate) fn connected_field(&self, name: &str, field_name: &str, visibility: Visibility) -> Option<Field> {
        let record = &self.records[self.handle(name)?.index()];
        let mut field = match &record.desc {
            Some(desc) => {
                let mut resolved = Field::from_resource_desc(field_name, visibility, desc);
                FieldBuilder::new(&mut resolved).flags(record.field.flags());
                resolved
            }
            None => record.field.clone(),
        };
        field.set_name(field_name);
        field.set_visibility(visibility);
        Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::graph::IoSize;
    use crate::types::BindFlags;

    fn output(name: &str) -> Field {
        let mut field = Field::new(name, "", Visibility::OUTPUT);
        FieldBuilder::new(&mut field).bind_flags(BindFlags::RENDER_TARGET);
        field
    }

    fn input(name: &str) -> Field {
        let mut field = Field::new(name, "", Visibility::INPUT);
        FieldBuilder::new(&mut field).bind_flags(BindFlags::SHADER_RESOURCE);
        field
    }

    #[test]
    fn test_alias_merges_bind_flags() {
        let mut cache = ResourceCache::new();
        let a = cache.register_field("a.color", &output("color"), 0, None).unwrap();
        let b = cache
            .register_field("b.color", &input("color"), 1, Some("a.color"))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            cache.field(a).unwrap().bind_flags(),
            BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE
        );
        assert_eq!(cache.lifetime(a), Some(Lifetime { first: 0, last: 1 }));
        assert_eq!(cache.names_of(a), vec!["a.color", "b.color"]);
    }

    #[test]
    fn test_format_conflict() {
        let mut cache = ResourceCache::new();
        let mut producer = output("color");
        FieldBuilder::new(&mut producer).format(ResourceFormat::Rgba8Unorm);
        let mut consumer = input("color");
        FieldBuilder::new(&mut consumer).format(ResourceFormat::R32Float);
        cache.register_field("a.color", &producer, 0, None).unwrap();
        let err = cache
            .register_field("b.color", &consumer, 1, Some("a.color"))
            .unwrap_err();
        assert!(matches!(err, GraphError::FieldConflict { .. }));
    }

    #[test]
    fn test_transient_aliasing() {
        let mut cache = ResourceCache::new();
        cache.register_field("a.tmp", &output("tmp"), 0, None).unwrap();
        cache.register_field("b.tmp", &input("tmp"), 1, Some("a.tmp")).unwrap();
        cache.register_field("c.tmp", &output("tmp"), 2, None).unwrap();
        cache.register_field("d.tmp", &input("tmp"), 3, Some("c.tmp")).unwrap();
        cache.register_field("d.out", &output("out"), 3, None).unwrap();
        cache.mark_output("d.out");
        cache.resolve(Extent2d::new(64, 64), ResourceFormat::Rgba8Unorm);
        cache.compute_aliasing(true, 4);

        // a.tmp lives [0,1], c.tmp lives [2,3], same descriptor.
        assert!(cache.shares_allocation("a.tmp", "c.tmp"));
        // d.out is a marked output and overlaps c.tmp anyway.
        assert!(!cache.shares_allocation("c.tmp", "d.out"));
        assert_eq!(cache.slot_count(), 2);

        cache.compute_aliasing(false, 4);
        assert_eq!(cache.slot_count(), 3);
    }

    #[test]
    fn test_persistent_never_aliased() {
        let mut cache = ResourceCache::new();
        let mut history = output("history");
        FieldBuilder::new(&mut history).persistent();
        cache.register_field("a.history", &history, 0, None).unwrap();
        cache.register_field("b.tmp", &output("tmp"), 1, None).unwrap();
        cache.resolve(Extent2d::new(8, 8), ResourceFormat::Rgba8Unorm);
        cache.compute_aliasing(true, 2);
        assert!(!cache.shares_allocation("a.history", "b.tmp"));
    }

    #[test]
    fn test_allocate_reuse_and_release() {
        let mut device = DummyDevice::new();
        let mut cache = ResourceCache::new();
        let mut full = output("color");
        FieldBuilder::new(&mut full).size_policy(IoSize::Full);
        cache.register_field("a.color", &full, 0, None).unwrap();
        cache.resolve(Extent2d::new(100, 100), ResourceFormat::Rgba8Unorm);
        cache.compute_aliasing(true, 1);
        cache.allocate(&mut device).unwrap();
        let first = cache.get("a.color").unwrap().clone();
        assert_eq!(first.width(), 100);

        // Same descriptor after a recompile keeps the allocation.
        let mut staged = cache.staged();
        staged.register_field("a.color", &full, 0, None).unwrap();
        staged.resolve(Extent2d::new(100, 100), ResourceFormat::Rgba8Unorm);
        staged.compute_aliasing(true, 1);
        cache.adopt(staged);
        cache.allocate(&mut device).unwrap();
        assert_eq!(cache.get("a.color").unwrap().id(), first.id());

        // A new size reallocates and destroys the old resource.
        let mut staged = cache.staged();
        staged.register_field("a.color", &full, 0, None).unwrap();
        staged.resolve(Extent2d::new(200, 200), ResourceFormat::Rgba8Unorm);
        staged.compute_aliasing(true, 1);
        cache.adopt(staged);
        cache.allocate(&mut device).unwrap();
        let second = cache.get("a.color").unwrap().clone();
        assert_ne!(second.id(), first.id());
        assert_eq!(second.width(), 200);
        assert!(!device.is_live(first.id()));

        cache.release_all(&mut device);
        assert_eq!(device.live_resource_count(), 0);
        assert!(cache.get("a.color").is_none());
    }

    #[test]
    fn test_allocation_failure() {
        let mut device = DummyDevice::new().with_max_dimension(32);
        let mut cache = ResourceCache::new();
        cache.register_field("a.color", &output("color"), 0, None).unwrap();
        cache.resolve(Extent2d::new(64, 64), ResourceFormat::Rgba8Unorm);
        cache.compute_aliasing(true, 1);
        let err = cache.allocate(&mut device).unwrap_err();
        assert!(matches!(err, GraphError::Allocation { ref resource, .. } if resource == "a.color"));
    }

    #[test]
    fn test_external_resources() {
        let mut device = DummyDevice::new();
        let texture = device
            .create_resource(&ResourceDesc::texture_2d(
                16,
                16,
                ResourceFormat::Rgba16Float,
                BindFlags::SHADER_RESOURCE,
            ))
            .unwrap();

        let mut cache = ResourceCache::new();
        cache.set_external("blit.src", Some(texture.clone()));
        let handle = cache.register_external("blit.src", &input("src"), 0).unwrap();
        assert!(cache.is_external(handle));
        assert_eq!(cache.field(handle).unwrap().format(), ResourceFormat::Rgba16Float);

        cache.resolve(Extent2d::new(64, 64), ResourceFormat::Rgba8Unorm);
        cache.compute_aliasing(true, 1);
        cache.allocate(&mut device).unwrap();
        assert_eq!(cache.get("blit.src").unwrap().id(), texture.id());
        assert_eq!(cache.allocation_count(), 0);

        cache.release_all(&mut device);
        assert!(device.is_live(texture.id()));
    }

    #[test]
    fn test_external_format_mismatch() {
        let mut device = DummyDevice::new();
        let texture = device
            .create_resource(&ResourceDesc::texture_2d(
                16,
                16,
                ResourceFormat::Rgba16Float,
                BindFlags::SHADER_RESOURCE,
            ))
            .unwrap();
        let mut cache = ResourceCache::new();
        cache.set_external("blit.src", Some(texture));
        let mut field = input("src");
        FieldBuilder::new(&mut field).format(ResourceFormat::R8Unorm);
        let err = cache.register_external("blit.src", &field, 0).unwrap_err();
        assert!(matches!(err, GraphError::FieldConflict { .. }));
    }
}
