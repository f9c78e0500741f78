//! The render pass contract.
//!
//! The graph treats passes as opaque nodes. Everything it knows about a pass
//! comes from [`RenderPass::reflect`]; everything a pass sees of the graph
//! during a frame comes through [`RenderData`].

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;

use crate::backend::GpuResource;
use crate::error::PassError;
use crate::types::{Extent2d, ResourceFormat};

use super::context::RenderContext;
use super::dictionary::Dictionary;
use super::properties::Properties;
use super::reflection::RenderPassReflection;

bitflags! {
    /// What was reloaded from disk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HotReloadFlags: u32 {
        /// Shader programs were recompiled.
        const PROGRAM = 1 << 0;
        /// Scene or texture assets changed.
        const ASSETS = 1 << 1;
    }
}

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// Mouse buttons reported by [`MouseEventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEventKind {
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Move,
    /// Wheel scrolled by the given amount.
    Wheel(f32),
}

/// Mouse input forwarded by [`RenderGraph::on_mouse_event`](super::RenderGraph::on_mouse_event).
///
/// Positions are normalized to `[0, 1]` across the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: [f32; 2],
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, position: [f32; 2]) -> Self {
        Self {
            kind,
            position,
            modifiers: Modifiers::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    Pressed,
    Released,
    Repeat,
}

/// Keyboard input forwarded by [`RenderGraph::on_key_event`](super::RenderGraph::on_key_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    /// Platform key code; the graph does not interpret it.
    pub key: u32,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, key: u32) -> Self {
        Self {
            kind,
            key,
            modifiers: Modifiers::empty(),
        }
    }
}

/// Scene collaborator handed to passes.
///
/// The graph never inspects the scene; it only stores it and forwards it
/// to every pass.
pub trait Scene: Send + Sync {
    /// Scene name, used in log output.
    fn name(&self) -> &str;
}

/// Immediate-mode UI collaborator passed to [`RenderPass::render_ui`].
pub trait Widgets {
    /// Open a collapsible group. Returns true if its content should be drawn.
    fn begin_group(&mut self, label: &str) -> bool;
    /// Close the group opened by the last successful [`Widgets::begin_group`].
    fn end_group(&mut self);
    /// Static text.
    fn text(&mut self, text: &str);
    /// A checkbox. Returns true if the value changed.
    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool;
    /// A float slider. Returns true if the value changed.
    fn slider(&mut self, label: &str, value: &mut f32, min: f32, max: f32) -> bool;
}

/// Data handed to [`RenderPass::reflect`] and [`RenderPass::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileData {
    /// Size used by default-sized fields (usually the window size).
    pub default_dims: Extent2d,
    /// Format used by fields whose format is still unknown after propagation.
    pub default_format: ResourceFormat,
    /// Resolved descriptors of every field of the pass. Empty during reflection.
    pub connected_resources: RenderPassReflection,
}

impl CompileData {
    /// Compile data with no connected resources.
    pub fn new(default_dims: Extent2d, default_format: ResourceFormat) -> Self {
        Self {
            default_dims,
            default_format,
            connected_resources: RenderPassReflection::new(),
        }
    }
}

/// Per-pass view of the graph during execution.
///
/// Resources are looked up by field name, either bare (`"color"`) or
/// qualified with this pass's name (`"tonemap.color"`). Only the fields the
/// pass declared are visible.
pub struct RenderData<'a> {
    pass_name: &'a str,
    resources: HashMap<String, GpuResource>,
    default_dims: Extent2d,
    default_format: ResourceFormat,
    dictionary: &'a mut Dictionary,
}

impl<'a> RenderData<'a> {
    pub(crate) fn new(
        pass_name: &'a str,
        resources: HashMap<String, GpuResource>,
        default_dims: Extent2d,
        default_format: ResourceFormat,
        dictionary: &'a mut Dictionary,
    ) -> Self {
        Self {
            pass_name,
            resources,
            default_dims,
            default_format,
            dictionary,
        }
    }

    /// Name of the executing pass.
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Get the resource bound to a field, or `None` for unbound optional fields.
    pub fn get(&self, name: &str) -> Option<&GpuResource> {
        let field = match name.split_once('.') {
            Some((pass, field)) if pass == self.pass_name => field,
            Some(_) => return None,
            None => name,
        };
        self.resources.get(field)
    }

    /// Get the resource bound to a field, failing if it is unbound.
    pub fn require(&self, name: &str) -> Result<&GpuResource, PassError> {
        self.get(name)
            .ok_or_else(|| PassError::MissingResource(name.to_owned()))
    }

    /// Default size of the graph.
    pub fn default_dims(&self) -> Extent2d {
        self.default_dims
    }

    /// Default texture format of the graph.
    pub fn default_format(&self) -> ResourceFormat {
        self.default_format
    }

    /// Graph dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        self.dictionary
    }

    /// Graph dictionary, writable.
    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        self.dictionary
    }
}

/// A node of the render graph.
///
/// Implementations declare their resources in [`reflect`](Self::reflect)
/// and record GPU work in [`execute`](Self::execute). All other callbacks
/// are optional.
///
/// # Example
///
/// ```
/// use vesper_graphics::error::PassError;
/// use vesper_graphics::graph::{CompileData, RenderContext, RenderData, RenderPass, RenderPassReflection};
/// use vesper_graphics::types::ClearValue;
///
/// struct Clear;
///
/// impl RenderPass for Clear {
///     fn type_name(&self) -> &str {
///         "Clear"
///     }
///
///     fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
///         let mut reflector = RenderPassReflection::new();
///         reflector.add_output("dst", "Cleared target");
///         Ok(reflector)
///     }
///
///     fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
///         ctx.clear(data.require("dst")?, ClearValue::color(0.0, 0.0, 0.0, 1.0));
///         Ok(())
///     }
/// }
/// ```
pub trait RenderPass {
    /// Registered type name, used by the exporter and hot swap.
    fn type_name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Current construction properties.
    fn properties(&self) -> Properties {
        Properties::new()
    }

    /// Describe the fields of the pass.
    fn reflect(&self, data: &CompileData) -> Result<RenderPassReflection, PassError>;

    /// Called once per compile with the resolved field descriptors.
    ///
    /// The hook may run for a plan that is discarded afterwards because a
    /// later pass failed to compile. Only cache what can be derived from
    /// `data`; the next successful compile calls this again on every
    /// executed pass.
    fn compile(&mut self, _data: &CompileData) -> Result<(), PassError> {
        Ok(())
    }

    /// Record the pass's GPU work.
    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError>;

    /// The default size of the graph changed.
    fn on_resize(&mut self, _size: Extent2d) {}

    fn set_scene(&mut self, _scene: Option<Arc<dyn Scene>>) {}

    fn render_ui(&mut self, _widgets: &mut dyn Widgets) {}

    /// Draw on top of the final image after the frame executed.
    fn render_overlay_ui(&mut self, _ctx: &mut RenderContext<'_>) {}

    /// Returns true when the pass consumed the event.
    fn on_mouse_event(&mut self, _event: &MouseEvent) -> bool {
        false
    }

    /// Returns true when the pass consumed the event.
    fn on_key_event(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn on_hot_reload(&mut self, _flags: HotReloadFlags) {}

    /// Passes with side effects are never culled, even without marked outputs.
    fn has_side_effects(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourceId;
    use crate::types::{BindFlags, ResourceDesc};

    fn resource(id: u64) -> GpuResource {
        GpuResource::new(
            ResourceId::new(id),
            ResourceDesc::texture_2d(4, 4, ResourceFormat::Rgba8Unorm, BindFlags::RENDER_TARGET),
        )
    }

    #[test]
    fn test_render_data_lookup() {
        let mut dict = Dictionary::new();
        let mut resources = HashMap::new();
        resources.insert("color".to_owned(), resource(1));
        let data = RenderData::new(
            "tonemap",
            resources,
            Extent2d::new(4, 4),
            ResourceFormat::Rgba32Float,
            &mut dict,
        );

        assert_eq!(data.get("color").map(|r| r.id().raw()), Some(1));
        assert_eq!(data.get("tonemap.color").map(|r| r.id().raw()), Some(1));
        assert!(data.get("other.color").is_none());
        assert!(matches!(data.require("depth"), Err(PassError::MissingResource(_))));
    }

    #[test]
    fn test_render_data_dictionary() {
        let mut dict = Dictionary::new();
        {
            let mut data = RenderData::new(
                "a",
                HashMap::new(),
                Extent2d::new(1, 1),
                ResourceFormat::Rgba32Float,
                &mut dict,
            );
            data.dictionary_mut().insert("frame", 3u32);
        }
        assert_eq!(dict.get::<u32>("frame"), Some(&3));
    }
}
