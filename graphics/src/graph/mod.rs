//! Render graph infrastructure.
//!
//! A [`RenderGraph`] is a DAG of named [`RenderPass`]es. Passes describe
//! their resources through [`RenderPassReflection`]; edges connect an output
//! field of one pass to an input field of another (`"gbuffer.depth"` →
//! `"ssao.depth"`) or simply order two passes (`"clear"` → `"ui"`).
//!
//! # Architecture
//!
//! | Phase | Entry point | Purpose |
//! |-------|-------------|---------|
//! | Build | [`RenderGraph::add_pass`], [`RenderGraph::add_edge`], [`RenderGraph::mark_output`] | Describe the frame |
//! | Compile | [`RenderGraph::compile`] | Reflect, resolve, cull, order, propagate formats |
//! | Execute | [`RenderGraph::execute`] | Allocate resources and run the passes |
//!
//! Compilation is memoized. Any mutation (passes, edges, outputs, inputs,
//! scene or size) invalidates it, and the next `execute` recompiles.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = RenderGraph::new("forward");
//! graph.create_pass(&registry, "gbuffer", "GBufferRaster", &Properties::new())?;
//! graph.create_pass(&registry, "tonemap", "ToneMapper", &Properties::new())?;
//! graph.add_edge("gbuffer.diffuse", "tonemap.src")?;
//! graph.mark_output("tonemap.dst", ChannelMask::RGB)?;
//!
//! let mut ctx = RenderContext::new(&mut device);
//! graph.execute(&mut ctx)?;
//! let frame = graph.get_output("tonemap.dst");
//! ```

mod compiler;
mod context;
mod dictionary;
mod executor;
mod import_export;
mod pass;
mod properties;
mod reflection;
mod registry;
mod resource_cache;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::backend::{Device, GpuResource};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::types::{Extent2d, ResourceFormat};

use compiler::{CompileInput, CompiledGraph};
use executor::FrameInput;

pub use context::RenderContext;
pub use dictionary::{keys, Dictionary, RefreshFlags};
pub use import_export::{
    default_function_name, DescriptionError, EdgeDescription, GraphDescription, GraphFile,
    OutputDescription, PassDescription, RenderGraphExporter, RenderGraphImporter, RenderGraphIr,
};
pub use pass::{
    CompileData, HotReloadFlags, KeyEvent, KeyEventKind, Modifiers, MouseButton, MouseEvent, MouseEventKind,
    RenderData, RenderPass, Scene, Widgets,
};
pub use properties::{Properties, PropertyValue};
pub use reflection::{Field, FieldBuilder, FieldFlags, IoSize, RenderPassReflection, Visibility};
pub use registry::{PassConstructor, PassRegistration, PassRegistry};
pub use resource_cache::{Lifetime, ResourceCache, ResourceHandle};

/// Identity of a pass within its graph.
///
/// Ids follow insertion order and are never reused, even after the pass is
/// removed. Hot swapping keeps the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(u32);

impl PassId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Insertion index of the pass.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct PassNode {
    pub(crate) name: String,
    pub(crate) pass: Box<dyn RenderPass>,
    /// Reflection of the last compile.
    pub(crate) reflection: Option<RenderPassReflection>,
}

impl fmt::Debug for PassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("type", &self.pass.type_name())
            .finish()
    }
}

/// A directed connection between two passes.
///
/// Data edges connect `src_pass.src_field` to `dst_pass.dst_field`;
/// execution edges only order two passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    src_pass: String,
    src_field: Option<String>,
    dst_pass: String,
    dst_field: Option<String>,
}

impl Edge {
    pub(crate) fn data(src_pass: &str, src_field: &str, dst_pass: &str, dst_field: &str) -> Self {
        Self {
            src_pass: src_pass.to_owned(),
            src_field: Some(src_field.to_owned()),
            dst_pass: dst_pass.to_owned(),
            dst_field: Some(dst_field.to_owned()),
        }
    }

    pub(crate) fn execution(src_pass: &str, dst_pass: &str) -> Self {
        Self {
            src_pass: src_pass.to_owned(),
            src_field: None,
            dst_pass: dst_pass.to_owned(),
            dst_field: None,
        }
    }

    pub fn src_pass(&self) -> &str {
        &self.src_pass
    }

    pub fn src_field(&self) -> Option<&str> {
        self.src_field.as_deref()
    }

    pub fn dst_pass(&self) -> &str {
        &self.dst_pass
    }

    pub fn dst_field(&self) -> Option<&str> {
        self.dst_field.as_deref()
    }

    /// Returns true for field-to-field edges.
    pub fn is_data(&self) -> bool {
        self.src_field.is_some()
    }

    /// Source endpoint as written in `add_edge`.
    pub fn src(&self) -> String {
        endpoint(&self.src_pass, self.src_field.as_deref())
    }

    /// Destination endpoint as written in `add_edge`.
    pub fn dst(&self) -> String {
        endpoint(&self.dst_pass, self.dst_field.as_deref())
    }
}

fn endpoint(pass: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{pass}.{field}"),
        None => pass.to_owned(),
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src(), self.dst())
    }
}

bitflags! {
    /// Channels of a marked output the caller is interested in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const RGB = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const RGBA = Self::RGB.bits() | Self::ALPHA.bits();
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::RGB
    }
}

const CHANNEL_NAMES: [(ChannelMask, &str); 4] = [
    (ChannelMask::RED, "red"),
    (ChannelMask::GREEN, "green"),
    (ChannelMask::BLUE, "blue"),
    (ChannelMask::ALPHA, "alpha"),
];

impl ChannelMask {
    /// Lowercase names of the set channels.
    pub fn channel_names(self) -> Vec<&'static str> {
        CHANNEL_NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Parse channel names. Returns `None` on an unknown name.
    pub fn from_channel_names<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        names.iter().try_fold(Self::empty(), |mask, name| {
            CHANNEL_NAMES
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(name.as_ref()))
                .map(|(bit, _)| mask | *bit)
        })
    }
}

/// A field exposed to the caller after execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkedOutput {
    pass: String,
    field: String,
    mask: ChannelMask,
}

impl MarkedOutput {
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn mask(&self) -> ChannelMask {
        self.mask
    }

    /// `"pass.field"`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.pass, self.field)
    }
}

/// What a hot swap could not carry over to the new pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotSwapReport {
    /// Edges whose field no longer exists with the same direction.
    pub dropped_edges: Vec<Edge>,
    /// Marked outputs the new pass no longer produces.
    pub dropped_outputs: Vec<MarkedOutput>,
    /// External inputs the new pass no longer declares.
    pub dropped_inputs: Vec<String>,
}

impl HotSwapReport {
    /// Returns true if everything was preserved.
    pub fn is_clean(&self) -> bool {
        self.dropped_edges.is_empty() && self.dropped_outputs.is_empty() && self.dropped_inputs.is_empty()
    }
}

/// Split `"pass"` or `"pass.field"`.
fn parse_endpoint(name: &str) -> GraphResult<(&str, Option<&str>)> {
    match name.split_once('.') {
        None if !name.is_empty() => Ok((name, None)),
        Some((pass, field)) if !pass.is_empty() && !field.is_empty() && !field.contains('.') => {
            Ok((pass, Some(field)))
        }
        _ => Err(GraphError::InvalidFieldName(name.to_owned())),
    }
}

/// Split `"pass.field"`, requiring the field part.
fn parse_field(name: &str) -> GraphResult<(&str, &str)> {
    match parse_endpoint(name)? {
        (pass, Some(field)) => Ok((pass, field)),
        _ => Err(GraphError::InvalidFieldName(name.to_owned())),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

/// The render graph describes a frame's rendering operations.
pub struct RenderGraph {
    name: String,
    passes: Vec<Option<PassNode>>,
    ids: HashMap<String, PassId>,
    edges: Vec<Edge>,
    outputs: Vec<MarkedOutput>,
    cache: ResourceCache,
    dictionary: Dictionary,
    default_dims: Extent2d,
    default_format: ResourceFormat,
    transient_aliasing: bool,
    scene: Option<Arc<dyn Scene>>,
    compiled: Option<CompiledGraph>,
    dirty: bool,
}

impl RenderGraph {
    /// Create an empty graph with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &GraphConfig::default())
    }

    /// Create an empty graph using the default size, format and aliasing
    /// setting of `config`.
    pub fn with_config(name: impl Into<String>, config: &GraphConfig) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
            ids: HashMap::new(),
            edges: Vec::new(),
            outputs: Vec::new(),
            cache: ResourceCache::new(),
            dictionary: Dictionary::new(),
            default_dims: config.default_dims(),
            default_format: config.default_format,
            transient_aliasing: config.transient_aliasing,
            scene: None,
            compiled: None,
            dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Add a pass under a unique name.
    pub fn add_pass(&mut self, mut pass: Box<dyn RenderPass>, name: &str) -> GraphResult<PassId> {
        if name.is_empty() || name.contains('.') {
            return Err(GraphError::InvalidFieldName(name.to_owned()));
        }
        if self.ids.contains_key(name) {
            return Err(GraphError::NameCollision(name.to_owned()));
        }
        if let Some(scene) = &self.scene {
            pass.set_scene(Some(Arc::clone(scene)));
        }

        let id = PassId::new(self.passes.len());
        log::debug!("Adding pass '{name}' ({}) as {id}", pass.type_name());
        self.passes.push(Some(PassNode {
            name: name.to_owned(),
            pass,
            reflection: None,
        }));
        self.ids.insert(name.to_owned(), id);
        self.invalidate();
        Ok(id)
    }

    /// Construct a pass through the registry and add it.
    pub fn create_pass(
        &mut self,
        registry: &PassRegistry,
        name: &str,
        type_name: &str,
        properties: &Properties,
    ) -> GraphResult<PassId> {
        if self.ids.contains_key(name) {
            return Err(GraphError::NameCollision(name.to_owned()));
        }
        let pass = registry.create(type_name, properties)?;
        self.add_pass(pass, name)
    }

    /// Remove a pass with its edges, marked outputs and external inputs.
    pub fn remove_pass(&mut self, name: &str) -> GraphResult<()> {
        let id = self
            .ids
            .remove(name)
            .ok_or_else(|| GraphError::UnknownPass(name.to_owned()))?;
        self.passes[id.index()] = None;
        self.edges
            .retain(|e| e.src_pass != name && e.dst_pass != name);
        self.outputs.retain(|o| o.pass != name);
        self.cache.remove_externals_of(name);
        log::debug!("Removed pass '{name}'");
        self.invalidate();
        Ok(())
    }

    /// Recreate a pass with new properties, keeping its name and edges.
    pub fn update_pass(
        &mut self,
        registry: &PassRegistry,
        name: &str,
        properties: &Properties,
    ) -> GraphResult<HotSwapReport> {
        let type_name = self
            .pass(name)
            .ok_or_else(|| GraphError::UnknownPass(name.to_owned()))?
            .type_name()
            .to_owned();
        let pass = registry.create(&type_name, properties)?;
        self.replace_pass(name, pass)
    }

    /// Swap in a new pass under an existing name.
    ///
    /// Edges, marked outputs and external inputs survive when the new pass
    /// declares the same field with the same direction. The rest is removed
    /// and listed in the returned report.
    pub fn replace_pass(&mut self, name: &str, mut pass: Box<dyn RenderPass>) -> GraphResult<HotSwapReport> {
        let id = self.pass_id(name)?;
        let reflection = pass
            .reflect(&self.compile_data())
            .map_err(|e| GraphError::Reflection {
                pass: name.to_owned(),
                reason: e.to_string(),
            })?;
        reflection.validate().map_err(|reason| GraphError::Reflection {
            pass: name.to_owned(),
            reason,
        })?;
        if let Some(scene) = &self.scene {
            pass.set_scene(Some(Arc::clone(scene)));
        }

        let has = |field: Option<&str>, direction: Direction| match field {
            None => true,
            Some(field) => reflection.field(field).is_some_and(|f| match direction {
                Direction::Input => f.is_input(),
                Direction::Output => f.is_output(),
            }),
        };

        let mut report = HotSwapReport::default();

        let (kept, dropped): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| {
                (e.src_pass != name || has(e.src_field(), Direction::Output))
                    && (e.dst_pass != name || has(e.dst_field(), Direction::Input))
            });
        self.edges = kept;
        report.dropped_edges = dropped;

        let (kept, dropped): (Vec<MarkedOutput>, Vec<MarkedOutput>) = std::mem::take(&mut self.outputs)
            .into_iter()
            .partition(|o| o.pass != name || has(Some(o.field.as_str()), Direction::Output));
        self.outputs = kept;
        report.dropped_outputs = dropped;

        let stale_inputs: Vec<String> = self
            .cache
            .external_names()
            .into_iter()
            .filter(|input| {
                parse_field(input)
                    .is_ok_and(|(pass, field)| pass == name && !has(Some(field), Direction::Input))
            })
            .map(str::to_owned)
            .collect();
        for input in &stale_inputs {
            self.cache.set_external(input, None);
        }
        report.dropped_inputs = stale_inputs;

        for edge in &report.dropped_edges {
            log::warn!("Hot swap of '{name}' dropped edge {edge}");
        }
        for output in &report.dropped_outputs {
            log::warn!("Hot swap of '{name}' dropped marked output '{}'", output.name());
        }
        for input in &report.dropped_inputs {
            log::warn!("Hot swap of '{name}' dropped external input '{input}'");
        }

        log::info!("Replaced pass '{name}' with a new {}", pass.type_name());
        self.passes[id.index()] = Some(PassNode {
            name: name.to_owned(),
            pass,
            reflection: Some(reflection),
        });
        self.invalidate();
        Ok(report)
    }

    /// Look up a pass.
    pub fn pass(&self, name: &str) -> Option<&dyn RenderPass> {
        let id = self.ids.get(name)?;
        self.node(*id).map(|n| n.pass.as_ref())
    }

    /// Look up a pass for modification. Invalidates the compiled plan.
    pub fn pass_mut(&mut self, name: &str) -> Option<&mut dyn RenderPass> {
        let id = *self.ids.get(name)?;
        self.dirty = true;
        self.passes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|n| n.pass.as_mut() as &mut dyn RenderPass)
    }

    /// Id of a pass.
    pub fn pass_id(&self, name: &str) -> GraphResult<PassId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownPass(name.to_owned()))
    }

    /// Name of a pass.
    pub fn pass_name(&self, id: PassId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    /// All passes in insertion order.
    pub fn passes(&self) -> impl Iterator<Item = (PassId, &str, &dyn RenderPass)> + '_ {
        self.passes.iter().enumerate().filter_map(|(i, node)| {
            node.as_ref()
                .map(|n| (PassId::new(i), n.name.as_str(), n.pass.as_ref()))
        })
    }

    pub fn pass_count(&self) -> usize {
        self.ids.len()
    }

    /// Current reflection of a pass.
    pub fn reflection(&self, name: &str) -> GraphResult<RenderPassReflection> {
        let id = self.pass_id(name)?;
        self.reflect(id)
    }

    fn node(&self, id: PassId) -> Option<&PassNode> {
        self.passes.get(id.index()).and_then(Option::as_ref)
    }

    fn reflect(&self, id: PassId) -> GraphResult<RenderPassReflection> {
        let node = self
            .node(id)
            .ok_or_else(|| GraphError::UnknownPass(id.to_string()))?;
        node.pass
            .reflect(&self.compile_data())
            .map_err(|e| GraphError::Reflection {
                pass: node.name.clone(),
                reason: e.to_string(),
            })
    }

    fn check_field(&self, pass: &str, field: &str, direction: Direction) -> GraphResult<()> {
        let reflection = self.reflection(pass)?;
        let found = reflection.field(field).is_some_and(|f| match direction {
            Direction::Input => f.is_input(),
            Direction::Output => f.is_output(),
        });
        if found {
            Ok(())
        } else {
            Err(GraphError::UnknownField {
                pass: pass.to_owned(),
                field: field.to_owned(),
                direction: match direction {
                    Direction::Input => "input",
                    Direction::Output => "output",
                },
            })
        }
    }

    fn compile_data(&self) -> CompileData {
        CompileData::new(self.default_dims, self.default_format)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Connect `"src.field"` to `"dst.field"`, or order `"src"` before `"dst"`.
    pub fn add_edge(&mut self, src: &str, dst: &str) -> GraphResult<()> {
        let edge = self.parse_edge(src, dst)?;

        if edge.src_pass == edge.dst_pass {
            return Err(GraphError::EdgeConflict {
                src: src.to_owned(),
                dst: dst.to_owned(),
                reason: "a pass cannot depend on itself".into(),
            });
        }
        if let (Some(src_field), Some(dst_field)) = (edge.src_field(), edge.dst_field()) {
            self.check_field(&edge.src_pass, src_field, Direction::Output)?;
            self.check_field(&edge.dst_pass, dst_field, Direction::Input)?;
        }
        if self.edges.contains(&edge) {
            return Err(GraphError::EdgeConflict {
                src: src.to_owned(),
                dst: dst.to_owned(),
                reason: "the edge already exists".into(),
            });
        }
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.is_data() && e.dst_pass == edge.dst_pass && e.dst_field == edge.dst_field)
        {
            return Err(GraphError::EdgeConflict {
                src: src.to_owned(),
                dst: dst.to_owned(),
                reason: format!("the input is already connected to '{}'", existing.src()),
            });
        }

        log::debug!("Adding edge {edge}");
        self.edges.push(edge);
        self.invalidate();
        Ok(())
    }

    /// Remove an edge added with [`add_edge`](Self::add_edge).
    pub fn remove_edge(&mut self, src: &str, dst: &str) -> GraphResult<()> {
        let edge = self.parse_edge(src, dst)?;
        let index = self
            .edges
            .iter()
            .position(|e| *e == edge)
            .ok_or_else(|| GraphError::EdgeConflict {
                src: src.to_owned(),
                dst: dst.to_owned(),
                reason: "no such edge".into(),
            })?;
        self.edges.remove(index);
        log::debug!("Removed edge {edge}");
        self.invalidate();
        Ok(())
    }

    fn parse_edge(&self, src: &str, dst: &str) -> GraphResult<Edge> {
        let (src_pass, src_field) = parse_endpoint(src)?;
        let (dst_pass, dst_field) = parse_endpoint(dst)?;
        self.pass_id(src_pass)?;
        self.pass_id(dst_pass)?;
        match (src_field, dst_field) {
            (Some(src_field), Some(dst_field)) => Ok(Edge::data(src_pass, src_field, dst_pass, dst_field)),
            (None, None) => Ok(Edge::execution(src_pass, dst_pass)),
            _ => Err(GraphError::EdgeConflict {
                src: src.to_owned(),
                dst: dst.to_owned(),
                reason: "cannot connect a field to a whole pass".into(),
            }),
        }
    }

    /// Explicit edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges inferred by the last successful compile.
    pub fn auto_edges(&self) -> &[Edge] {
        self.compiled
            .as_ref()
            .map(|c| c.auto_edges.as_slice())
            .unwrap_or_default()
    }

    // ========================================================================
    // Outputs and inputs
    // ========================================================================

    /// Expose `"pass.field"` to the caller. Marking it again updates the mask.
    pub fn mark_output(&mut self, name: &str, mask: ChannelMask) -> GraphResult<()> {
        let (pass, field) = parse_field(name)?;
        self.check_field(pass, field, Direction::Output)?;

        match self.outputs.iter_mut().find(|o| o.pass == pass && o.field == field) {
            Some(output) => output.mask = mask,
            None => self.outputs.push(MarkedOutput {
                pass: pass.to_owned(),
                field: field.to_owned(),
                mask,
            }),
        }
        self.invalidate();
        Ok(())
    }

    /// Stop exposing `"pass.field"`.
    pub fn unmark_output(&mut self, name: &str) -> GraphResult<()> {
        let (pass, field) = parse_field(name)?;
        match self.outputs.iter().position(|o| o.pass == pass && o.field == field) {
            Some(index) => {
                self.outputs.remove(index);
                self.invalidate();
            }
            None => log::warn!("Cannot unmark '{name}', it is not a marked output"),
        }
        Ok(())
    }

    pub fn is_output(&self, name: &str) -> bool {
        parse_field(name).is_ok_and(|(pass, field)| {
            self.outputs.iter().any(|o| o.pass == pass && o.field == field)
        })
    }

    /// Marked outputs in marking order.
    pub fn outputs(&self) -> &[MarkedOutput] {
        &self.outputs
    }

    /// Every output field of every pass, as `"pass.field"`.
    pub fn available_outputs(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (id, name, _) in self.passes() {
            match self.reflect(id) {
                Ok(reflection) => {
                    names.extend(reflection.outputs().map(|f| format!("{name}.{}", f.name())));
                }
                Err(err) => log::warn!("{err}"),
            }
        }
        names
    }

    /// Output fields that are not marked.
    pub fn unmarked_outputs(&self) -> Vec<String> {
        self.available_outputs()
            .into_iter()
            .filter(|name| !self.is_output(name))
            .collect()
    }

    /// Bind a caller-owned resource to an input field, or unbind with `None`.
    pub fn set_input(&mut self, name: &str, resource: Option<GpuResource>) -> GraphResult<()> {
        let (pass, field) = parse_field(name)?;
        self.check_field(pass, field, Direction::Input)?;
        self.cache.set_external(name, resource);
        self.invalidate();
        Ok(())
    }

    /// Resource of a marked output after execution.
    pub fn get_output(&self, name: &str) -> Option<&GpuResource> {
        if !self.is_output(name) {
            log::warn!("'{name}' is not a marked output");
            return None;
        }
        self.cache.get(name)
    }

    /// Resource currently bound to any `"pass.field"`.
    pub fn get_resource(&self, name: &str) -> Option<&GpuResource> {
        self.cache.get(name)
    }

    // ========================================================================
    // Compilation and execution
    // ========================================================================

    /// Compile the graph if anything changed since the last compile.
    ///
    /// On failure the previous plan is kept and the graph stays dirty.
    pub fn compile(&mut self) -> GraphResult<()> {
        if !self.dirty && self.compiled.is_some() {
            return Ok(());
        }

        let input = CompileInput {
            passes: &mut self.passes,
            edges: &self.edges,
            outputs: &self.outputs,
            default_dims: self.default_dims,
            default_format: self.default_format,
            transient_aliasing: self.transient_aliasing,
        };

        match compiler::compile(input, &self.cache) {
            Ok((plan, staged)) => {
                self.cache.adopt(staged);
                log::info!(
                    "Compiled render graph '{}': {} of {} passes, {} resources",
                    self.name,
                    plan.order.len(),
                    self.ids.len(),
                    self.cache.resource_count()
                );
                self.compiled = Some(plan);
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                log::warn!("Failed to compile render graph '{}': {err}", self.name);
                Err(err)
            }
        }
    }

    /// Compile if needed, allocate resources and run every pass.
    pub fn execute(&mut self, ctx: &mut RenderContext<'_>) -> GraphResult<()> {
        self.compile()?;
        self.cache.allocate(ctx.device())?;

        let Some(plan) = self.compiled.as_ref() else {
            return Ok(());
        };
        let frame = FrameInput {
            plan,
            cache: &self.cache,
            dictionary: &mut self.dictionary,
            default_dims: self.default_dims,
            default_format: self.default_format,
        };
        executor::execute(&mut self.passes, frame, ctx)
    }

    /// Returns true if the current plan matches the graph.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some() && !self.dirty
    }

    /// Pass names of the last successful compile, in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.compiled
            .as_ref()
            .map(|c| c.order.iter().filter_map(|&id| self.pass_name(id)).collect())
            .unwrap_or_default()
    }

    /// Destroy every graph-owned resource. They are recreated on the next
    /// execute.
    pub fn release_resources(&mut self, device: &mut dyn Device) {
        self.cache.release_all(device);
    }

    pub fn resource_cache(&self) -> &ResourceCache {
        &self.cache
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }

    // ========================================================================
    // Frame state and forwarding
    // ========================================================================

    /// Change the default size and notify every pass.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        let size = Extent2d::new(width, height);
        if size.is_empty() {
            log::debug!("Ignoring resize to {width}x{height}");
            return;
        }
        if size == self.default_dims {
            return;
        }

        log::info!(
            "Resizing render graph '{}' from {}x{} to {width}x{height}",
            self.name,
            self.default_dims.width,
            self.default_dims.height
        );
        self.default_dims = size;
        for node in self.passes.iter_mut().flatten() {
            node.pass.on_resize(size);
        }
        self.invalidate();
    }

    pub fn default_dims(&self) -> Extent2d {
        self.default_dims
    }

    pub fn default_format(&self) -> ResourceFormat {
        self.default_format
    }

    /// Set the scene of every current and future pass.
    pub fn set_scene(&mut self, scene: Option<Arc<dyn Scene>>) {
        match &scene {
            Some(scene) => log::debug!("Setting scene '{}' on graph '{}'", scene.name(), self.name),
            None => log::debug!("Clearing scene of graph '{}'", self.name),
        }
        for node in self.passes.iter_mut().flatten() {
            node.pass.set_scene(scene.clone());
        }
        self.scene = scene;
        self.invalidate();
    }

    pub fn scene(&self) -> Option<&Arc<dyn Scene>> {
        self.scene.as_ref()
    }

    /// Forward a hot reload to every pass.
    pub fn on_hot_reload(&mut self, flags: HotReloadFlags) {
        for id in self.ordered_ids() {
            if let Some(node) = self.passes.get_mut(id.index()).and_then(Option::as_mut) {
                node.pass.on_hot_reload(flags);
            }
        }
    }

    /// Draw the UI of every pass, one group per pass.
    pub fn render_ui(&mut self, widgets: &mut dyn Widgets) {
        for id in self.ordered_ids() {
            if let Some(node) = self.passes.get_mut(id.index()).and_then(Option::as_mut) {
                if widgets.begin_group(&node.name) {
                    node.pass.render_ui(widgets);
                    widgets.end_group();
                }
            }
        }
    }

    /// Let every executed pass draw over the final image.
    pub fn render_overlay_ui(&mut self, ctx: &mut RenderContext<'_>) {
        for id in self.executed_ids() {
            if let Some(node) = self.passes.get_mut(id.index()).and_then(Option::as_mut) {
                node.pass.render_overlay_ui(ctx);
            }
        }
    }

    /// Offer a mouse event to the executed passes in order. Stops at the
    /// first pass that consumes it.
    pub fn on_mouse_event(&mut self, event: &MouseEvent) -> bool {
        self.executed_ids().into_iter().any(|id| {
            self.passes
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .is_some_and(|node| node.pass.on_mouse_event(event))
        })
    }

    /// Offer a key event to the executed passes in order. Stops at the
    /// first pass that consumes it.
    pub fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.executed_ids().into_iter().any(|id| {
            self.passes
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .is_some_and(|node| node.pass.on_key_event(event))
        })
    }

    fn executed_ids(&self) -> Vec<PassId> {
        self.compiled
            .as_ref()
            .map(|c| c.order.clone())
            .unwrap_or_default()
    }

    /// Executed passes in execution order, then the culled ones.
    fn ordered_ids(&self) -> Vec<PassId> {
        let mut ids: Vec<PassId> = self
            .compiled
            .as_ref()
            .map(|c| {
                c.order
                    .iter()
                    .copied()
                    .filter(|&id| self.node(id).is_some())
                    .collect()
            })
            .unwrap_or_default();
        for (id, _, _) in self.passes() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }
}

impl fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderGraph")
            .field("name", &self.name)
            .field("passes", &self.passes.iter().flatten().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("outputs", &self.outputs)
            .field("default_dims", &self.default_dims)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
