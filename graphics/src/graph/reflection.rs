//! Pass reflection: the self-description of a pass's resources.
//!
//! Every [`RenderPass`](super::RenderPass) describes the fields it reads,
//! writes or uses internally by returning a [`RenderPassReflection`] from
//! `reflect`. The compiler uses these descriptions to connect passes, infer
//! formats and sizes, and create the backing resources.
//!
//! # Example
//!
//! ```
//! use vesper_graphics::graph::{IoSize, RenderPassReflection};
//! use vesper_graphics::types::{BindFlags, ResourceFormat};
//!
//! let mut reflector = RenderPassReflection::new();
//! reflector.add_input("src", "Source color");
//! reflector
//!     .add_output("dst", "Tone mapped color")
//!     .format(ResourceFormat::Rgba8Unorm)
//!     .size_policy(IoSize::Full);
//! reflector
//!     .add_internal("luminance", "Average luminance")
//!     .texture_2d(1, 1)
//!     .format(ResourceFormat::R32Float)
//!     .bind_flags(BindFlags::UNORDERED_ACCESS);
//!
//! assert_eq!(reflector.fields().count(), 3);
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{BindFlags, Extent2d, Extent3d, ResourceDesc, ResourceFormat, ResourceKind};

bitflags! {
    /// Direction of a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Visibility: u32 {
        /// Read by the pass, produced elsewhere.
        const INPUT = 1 << 0;
        /// Produced by the pass.
        const OUTPUT = 1 << 1;
        /// Scratch resource used only inside the pass.
        const INTERNAL = 1 << 2;
    }
}

bitflags! {
    /// Additional field properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        /// The pass runs without this input bound.
        const OPTIONAL = 1 << 0;
        /// The content must survive between frames; never aliased with
        /// other transient resources.
        const PERSISTENT = 1 << 1;
    }
}

/// Rule deriving a field's size from the graph's default (window) size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IoSize {
    /// Use the declared dimensions; zero dimensions are inherited from the
    /// producer, or from the default size when nothing is connected.
    #[default]
    Default,
    /// Use the declared dimensions exactly.
    Fixed,
    /// Same as the window.
    Full,
    /// Half of the window, rounded down, at least one pixel.
    Half,
    /// Quarter of the window, rounded down, at least one pixel.
    Quarter,
    /// Twice the window, saturating at `u32::MAX`.
    Double,
}

impl IoSize {
    /// Returns true if the resolved size follows the window size.
    pub fn depends_on_window(self) -> bool {
        matches!(self, Self::Full | Self::Half | Self::Quarter | Self::Double)
    }

    /// Scale the default size according to the policy.
    ///
    /// Returns `None` for [`IoSize::Default`] and [`IoSize::Fixed`], which
    /// are not derived from the window size.
    pub fn scale(self, default: Extent2d) -> Option<Extent2d> {
        let scaled = |divisor: u32| {
            Extent2d::new(
                (default.width / divisor).max(1),
                (default.height / divisor).max(1),
            )
        };
        match self {
            Self::Default | Self::Fixed => None,
            Self::Full => Some(default),
            Self::Half => Some(scaled(2)),
            Self::Quarter => Some(scaled(4)),
            Self::Double => Some(Extent2d::new(
                default.width.saturating_mul(2),
                default.height.saturating_mul(2),
            )),
        }
    }
}

/// Description of one named resource slot of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    description: String,
    visibility: Visibility,
    kind: ResourceKind,
    width: u32,
    height: u32,
    depth: u32,
    array_size: u32,
    mip_levels: u32,
    sample_count: u32,
    format: ResourceFormat,
    bind_flags: BindFlags,
    flags: FieldFlags,
    size_policy: IoSize,
    size_reference: Option<String>,
}

impl Field {
    /// Create a 2D texture field with every property left to the compiler.
    pub fn new(name: impl Into<String>, description: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            visibility,
            kind: ResourceKind::Texture2D,
            width: 0,
            height: 0,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format: ResourceFormat::Unknown,
            bind_flags: BindFlags::empty(),
            flags: FieldFlags::empty(),
            size_policy: IoSize::Default,
            size_reference: None,
        }
    }

    /// Field name, unique within the pass.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Field direction.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Returns true if the field is read by the pass.
    pub fn is_input(&self) -> bool {
        self.visibility.contains(Visibility::INPUT)
    }

    /// Returns true if the field is produced by the pass.
    pub fn is_output(&self) -> bool {
        self.visibility.contains(Visibility::OUTPUT)
    }

    /// Returns true if the field is pass-private scratch memory.
    pub fn is_internal(&self) -> bool {
        self.visibility.contains(Visibility::INTERNAL)
    }

    /// Returns true if the pass tolerates this field being unbound.
    pub fn is_optional(&self) -> bool {
        self.flags.contains(FieldFlags::OPTIONAL)
    }

    /// Returns true if the field must not be aliased with other transients.
    pub fn is_persistent(&self) -> bool {
        self.flags.contains(FieldFlags::PERSISTENT)
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Declared width (byte size for buffers), 0 if unresolved.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Declared height, 0 if unresolved.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Declared depth, 0 if unresolved.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Array layer count.
    pub fn array_size(&self) -> u32 {
        self.array_size
    }

    /// Mip level count.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Sample count.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Declared format.
    pub fn format(&self) -> ResourceFormat {
        self.format
    }

    /// Declared bind flags.
    pub fn bind_flags(&self) -> BindFlags {
        self.bind_flags
    }

    /// Field flags.
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Size policy.
    pub fn size_policy(&self) -> IoSize {
        self.size_policy
    }

    /// Name of the field whose size this one follows, if any.
    pub fn size_reference(&self) -> Option<&str> {
        self.size_reference.as_deref()
    }

    /// Returns true if the field pins down its own size.
    pub fn specifies_size(&self) -> bool {
        self.size_policy != IoSize::Default || self.width != 0 || self.height != 0
    }

    pub(crate) fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    /// Describe an existing resource as a fixed-size field.
    pub(crate) fn from_resource_desc(name: &str, visibility: Visibility, desc: &ResourceDesc) -> Self {
        let mut field = Self::new(name, "", visibility);
        field.kind = desc.kind;
        field.width = desc.size.width;
        field.height = desc.size.height;
        field.depth = desc.size.depth;
        field.array_size = desc.array_size;
        field.mip_levels = desc.mip_levels;
        field.sample_count = desc.sample_count;
        field.format = desc.format;
        field.bind_flags = desc.bind_flags;
        field.size_policy = if desc.kind == ResourceKind::Buffer {
            IoSize::Default
        } else {
            IoSize::Fixed
        };
        field
    }

    /// Check that an existing resource can back this field.
    pub(crate) fn accepts(&self, desc: &ResourceDesc) -> Result<(), String> {
        if self.kind != desc.kind {
            return Err(format!(
                "'{}' expects a {:?} but the resource is a {:?}",
                self.name, self.kind, desc.kind
            ));
        }
        if !self.format.is_unknown() && self.format != desc.format {
            return Err(format!(
                "'{}' expects format {:?} but the resource has {:?}",
                self.name, self.format, desc.format
            ));
        }
        let explicit_size = self.size_policy == IoSize::Fixed
            || (self.size_policy == IoSize::Default && (self.width != 0 || self.height != 0));
        if explicit_size
            && self.kind != ResourceKind::Buffer
            && ((self.width != 0 && self.width != desc.size.width)
                || (self.height != 0 && self.height != desc.size.height))
        {
            return Err(format!(
                "'{}' expects {}x{} but the resource is {}x{}",
                self.name, self.width, self.height, desc.size.width, desc.size.height
            ));
        }
        if self.kind == ResourceKind::Buffer && self.width != 0 && self.width != desc.size.width {
            return Err(format!(
                "'{}' expects {} bytes but the buffer has {}",
                self.name, self.width, desc.size.width
            ));
        }
        Ok(())
    }

    /// Copy the size (dimensions and policy) of another field.
    pub(crate) fn copy_size_from(&mut self, other: &Field) {
        self.width = other.width;
        self.height = other.height;
        self.depth = other.depth;
        self.size_policy = other.size_policy;
    }

    /// Check that the field description is self-consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("field with an empty name".into());
        }
        if self.name.contains('.') {
            return Err(format!("field name '{}' must not contain '.'", self.name));
        }
        if self.visibility.is_empty() {
            return Err(format!("field '{}' has no visibility", self.name));
        }
        if self.is_internal() && self.visibility != Visibility::INTERNAL {
            return Err(format!(
                "field '{}' cannot be internal and input/output at once",
                self.name
            ));
        }
        if self.size_policy == IoSize::Fixed && (self.width == 0 || self.height == 0) {
            return Err(format!(
                "field '{}' uses a fixed size but declares {}x{}",
                self.name, self.width, self.height
            ));
        }
        if self.kind == ResourceKind::Buffer && self.width == 0 && !self.is_input() {
            return Err(format!(
                "buffer field '{}' has no byte size and no producer to inherit one from",
                self.name
            ));
        }
        if self.array_size == 0 || self.mip_levels == 0 || self.sample_count == 0 {
            return Err(format!(
                "field '{}' has a zero array size, mip count or sample count",
                self.name
            ));
        }
        Ok(())
    }

    /// Merge another field that aliases the same resource into this one.
    ///
    /// Unknown format and zero dimensions are filled in from `other`; bind
    /// flags are unioned. Conflicting concrete properties are an error.
    pub fn merge(&mut self, other: &Field) -> Result<(), String> {
        if self.kind != other.kind {
            return Err(format!(
                "'{}' is a {:?} but '{}' is a {:?}",
                self.name, self.kind, other.name, other.kind
            ));
        }

        if self.format.is_unknown() {
            self.format = other.format;
        } else if !other.format.is_unknown() && self.format != other.format {
            return Err(format!(
                "format {:?} of '{}' conflicts with {:?} of '{}'",
                self.format, self.name, other.format, other.name
            ));
        }

        if self.kind == ResourceKind::Buffer {
            if self.width == 0 {
                self.width = other.width;
            } else if other.width != 0 && self.width != other.width {
                return Err(format!(
                    "buffer size {} of '{}' conflicts with {} of '{}'",
                    self.width, self.name, other.width, other.name
                ));
            }
        } else if !self.specifies_size() && self.size_reference.is_none() {
            self.copy_size_from(other);
        } else if other.specifies_size()
            && (self.size_policy != other.size_policy
                || self.width != other.width
                || self.height != other.height
                || self.depth != other.depth)
        {
            return Err(format!(
                "size {:?} {}x{}x{} of '{}' conflicts with {:?} {}x{}x{} of '{}'",
                self.size_policy,
                self.width,
                self.height,
                self.depth,
                self.name,
                other.size_policy,
                other.width,
                other.height,
                other.depth,
                other.name
            ));
        }

        merge_count(&mut self.array_size, other.array_size, "array size", &self.name, &other.name)?;
        merge_count(&mut self.mip_levels, other.mip_levels, "mip count", &self.name, &other.name)?;
        merge_count(
            &mut self.sample_count,
            other.sample_count,
            "sample count",
            &self.name,
            &other.name,
        )?;

        self.bind_flags |= other.bind_flags;
        if other.is_persistent() {
            self.flags |= FieldFlags::PERSISTENT;
        }
        if !other.is_optional() {
            self.flags.remove(FieldFlags::OPTIONAL);
        }
        Ok(())
    }

    /// Build a concrete resource descriptor.
    ///
    /// Window-relative policies scale `default_size`; zero dimensions of
    /// [`IoSize::Default`] fields are taken from `default_size`; an unknown
    /// texture format becomes `default_format`.
    pub fn resolve_desc(&self, default_size: Extent2d, default_format: ResourceFormat) -> ResourceDesc {
        if self.kind == ResourceKind::Buffer {
            let mut desc = ResourceDesc::buffer(self.width, self.bind_flags);
            desc.array_size = self.array_size;
            return desc;
        }

        let size = match self.size_policy.scale(default_size) {
            Some(scaled) => Extent3d::new_3d(scaled.width, scaled.height, self.depth.max(1)),
            None => Extent3d::new_3d(
                if self.width == 0 { default_size.width } else { self.width },
                if self.height == 0 { default_size.height } else { self.height },
                self.depth.max(1),
            ),
        };

        let format = if self.format.is_unknown() {
            default_format
        } else {
            self.format
        };

        ResourceDesc {
            label: None,
            kind: self.kind,
            size,
            array_size: self.array_size,
            mip_levels: self.mip_levels,
            sample_count: self.sample_count,
            format,
            bind_flags: self.bind_flags,
        }
    }
}

/// Fluent editor for a [`Field`], returned by the `add_*` methods of
/// [`RenderPassReflection`].
#[derive(Debug)]
pub struct FieldBuilder<'a> {
    field: &'a mut Field,
}

impl<'a> FieldBuilder<'a> {
    pub fn new(field: &'a mut Field) -> Self {
        Self { field }
    }

    /// Make the field a 2D texture. Zero dimensions are resolved at compile time.
    pub fn texture_2d(self, width: u32, height: u32) -> Self {
        self.field.kind = ResourceKind::Texture2D;
        self.field.width = width;
        self.field.height = height;
        self.field.depth = 1;
        self
    }

    /// Make the field a volume texture.
    pub fn texture_3d(self, width: u32, height: u32, depth: u32) -> Self {
        self.field.kind = ResourceKind::Texture3D;
        self.field.width = width;
        self.field.height = height;
        self.field.depth = depth;
        self
    }

    /// Make the field a cube map with six array layers.
    pub fn texture_cube(self, width: u32, height: u32) -> Self {
        self.field.kind = ResourceKind::TextureCube;
        self.field.width = width;
        self.field.height = height;
        self.field.depth = 1;
        self.field.array_size = 6;
        self
    }

    /// Make the field a buffer of `byte_size` bytes.
    pub fn buffer(self, byte_size: u32) -> Self {
        self.field.kind = ResourceKind::Buffer;
        self.field.width = byte_size;
        self.field.height = 1;
        self.field.depth = 1;
        self.field.format = ResourceFormat::Unknown;
        self
    }

    /// Set the format. [`ResourceFormat::Unknown`] inherits from the producer.
    pub fn format(self, format: ResourceFormat) -> Self {
        self.field.format = format;
        self
    }

    /// Replace the bind flags.
    pub fn bind_flags(self, flags: BindFlags) -> Self {
        self.field.bind_flags = flags;
        self
    }

    /// Replace the field flags.
    pub fn flags(self, flags: FieldFlags) -> Self {
        self.field.flags = flags;
        self
    }

    pub fn optional(self) -> Self {
        self.field.flags |= FieldFlags::OPTIONAL;
        self
    }

    pub fn persistent(self) -> Self {
        self.field.flags |= FieldFlags::PERSISTENT;
        self
    }

    pub fn size_policy(self, policy: IoSize) -> Self {
        self.field.size_policy = policy;
        self
    }

    /// Take the size of another field of the same pass.
    pub fn match_size_of(self, field: impl Into<String>) -> Self {
        self.field.size_reference = Some(field.into());
        self
    }

    pub fn array_size(self, count: u32) -> Self {
        self.field.array_size = count;
        self
    }

    pub fn mip_levels(self, count: u32) -> Self {
        self.field.mip_levels = count;
        self
    }

    pub fn sample_count(self, count: u32) -> Self {
        self.field.sample_count = count;
        self
    }
}

fn merge_count(value: &mut u32, other: u32, what: &str, name: &str, other_name: &str) -> Result<(), String> {
    if *value == 1 {
        *value = other;
    } else if other != 1 && *value != other {
        return Err(format!(
            "{what} {} of '{name}' conflicts with {other} of '{other_name}'",
            *value
        ));
    }
    Ok(())
}

/// The full set of fields a pass declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPassReflection {
    fields: Vec<Field>,
}

impl RenderPassReflection {
    /// Create an empty reflection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input field. Inputs default to shader-resource binding.
    pub fn add_input(&mut self, name: &str, description: &str) -> FieldBuilder<'_> {
        self.add_field(name, description, Visibility::INPUT, BindFlags::SHADER_RESOURCE)
    }

    /// Declare an output field. Outputs default to render-target binding.
    pub fn add_output(&mut self, name: &str, description: &str) -> FieldBuilder<'_> {
        self.add_field(name, description, Visibility::OUTPUT, BindFlags::RENDER_TARGET)
    }

    /// Declare a field that is read and written in place.
    pub fn add_input_output(&mut self, name: &str, description: &str) -> FieldBuilder<'_> {
        self.add_field(
            name,
            description,
            Visibility::INPUT | Visibility::OUTPUT,
            BindFlags::UNORDERED_ACCESS,
        )
    }

    /// Declare a scratch resource private to the pass.
    pub fn add_internal(&mut self, name: &str, description: &str) -> FieldBuilder<'_> {
        self.add_field(
            name,
            description,
            Visibility::INTERNAL,
            BindFlags::UNORDERED_ACCESS | BindFlags::SHADER_RESOURCE,
        )
    }

    /// Add a fully built field, replacing any field of the same name.
    pub fn push(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    fn add_field(
        &mut self,
        name: &str,
        description: &str,
        visibility: Visibility,
        default_flags: BindFlags,
    ) -> FieldBuilder<'_> {
        // Declaring the same name twice widens the visibility instead of
        // creating a second field.
        let index = match self.fields.iter().position(|f| f.name == name) {
            Some(index) => {
                let field = &mut self.fields[index];
                field.visibility |= visibility;
                field.bind_flags |= default_flags;
                index
            }
            None => {
                let mut field = Field::new(name, description, visibility);
                field.bind_flags = default_flags;
                self.fields.push(field);
                self.fields.len() - 1
            }
        };
        FieldBuilder::new(&mut self.fields[index])
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by name for modification.
    pub fn field_mut(&mut self, name: &str) -> Option<FieldBuilder<'_>> {
        self.fields.iter_mut().find(|f| f.name == name).map(FieldBuilder::new)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter()
    }

    /// Fields read by the pass.
    pub fn inputs(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| f.is_input())
    }

    /// Fields produced by the pass.
    pub fn outputs(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| f.is_output())
    }

    /// Pass-private fields.
    pub fn internals(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| f.is_internal())
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the pass declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every field and cross-field size references.
    pub fn validate(&self) -> Result<(), String> {
        for field in &self.fields {
            field.validate()?;
            if let Some(reference) = field.size_reference() {
                if reference == field.name {
                    return Err(format!("field '{}' matches its own size", field.name));
                }
                if self.field(reference).is_none() {
                    return Err(format!(
                        "field '{}' matches the size of unknown field '{reference}'",
                        field.name
                    ));
                }
            }
        }
        self.size_order().map(|_| ())
    }

    /// Fields ordered so that every field comes after the field whose size
    /// it matches. Otherwise declaration order is kept.
    ///
    /// Fails on a cycle of size references.
    pub fn size_order(&self) -> Result<Vec<&Field>, String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Visiting,
            Done,
        }

        fn visit<'a>(
            index: usize,
            fields: &'a [Field],
            marks: &mut [Mark],
            order: &mut Vec<&'a Field>,
        ) -> Result<(), String> {
            match marks[index] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    return Err(format!(
                        "size references of field '{}' form a cycle",
                        fields[index].name
                    ))
                }
                Mark::New => {}
            }
            marks[index] = Mark::Visiting;
            if let Some(reference) = fields[index].size_reference() {
                if let Some(target) = fields.iter().position(|f| f.name == reference) {
                    visit(target, fields, marks, order)?;
                }
            }
            marks[index] = Mark::Done;
            order.push(&fields[index]);
            Ok(())
        }

        let mut marks = vec![Mark::New; self.fields.len()];
        let mut order = Vec::with_capacity(self.fields.len());
        for index in 0..self.fields.len() {
            visit(index, &self.fields, &mut marks, &mut order)?;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_size_scale() {
        let window = Extent2d::new(1920, 1080);
        assert_eq!(IoSize::Full.scale(window), Some(window));
        assert_eq!(IoSize::Half.scale(window), Some(Extent2d::new(960, 540)));
        assert_eq!(IoSize::Quarter.scale(window), Some(Extent2d::new(480, 270)));
        assert_eq!(IoSize::Double.scale(window), Some(Extent2d::new(3840, 2160)));
        assert_eq!(IoSize::Fixed.scale(window), None);
        assert_eq!(IoSize::Quarter.scale(Extent2d::new(2, 2)), Some(Extent2d::new(1, 1)));
    }

    #[test]
    fn test_io_size_double_saturates() {
        let huge = Extent2d::new(3_000_000_000, 8);
        assert_eq!(IoSize::Double.scale(huge), Some(Extent2d::new(u32::MAX, 16)));
    }

    #[test]
    fn test_add_same_name_widens_visibility() {
        let mut r = RenderPassReflection::new();
        r.add_input("color", "");
        r.add_output("color", "");
        assert_eq!(r.len(), 1);
        let field = r.field("color").unwrap();
        assert!(field.is_input() && field.is_output());
        assert!(field
            .bind_flags()
            .contains(BindFlags::SHADER_RESOURCE | BindFlags::RENDER_TARGET));
    }

    #[test]
    fn test_validate_rejects_fixed_zero_size() {
        let mut r = RenderPassReflection::new();
        r.add_output("dst", "").size_policy(IoSize::Fixed);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dotted_name() {
        let mut r = RenderPassReflection::new();
        r.add_output("a.b", "");
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_size_reference() {
        let mut r = RenderPassReflection::new();
        r.add_output("dst", "").match_size_of("missing");
        assert!(r.validate().is_err());

        let mut r = RenderPassReflection::new();
        r.add_input("src", "");
        r.add_output("dst", "").match_size_of("src");
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_size_order_follows_reference_chain() {
        let mut r = RenderPassReflection::new();
        r.add_output("c", "").match_size_of("b");
        r.add_output("b", "").match_size_of("src");
        r.add_input("src", "");
        r.add_output("plain", "");

        let order: Vec<&str> = r.size_order().unwrap().iter().map(|f| f.name()).collect();
        assert_eq!(order, vec!["src", "b", "c", "plain"]);
    }

    #[test]
    fn test_validate_rejects_size_reference_cycle() {
        let mut r = RenderPassReflection::new();
        r.add_output("a", "").match_size_of("b");
        r.add_output("b", "").match_size_of("c");
        r.add_output("c", "").match_size_of("a");
        let err = r.validate().unwrap_err();
        assert!(err.contains("cycle"), "{err}");
    }

    #[test]
    fn test_validate_rejects_sizeless_buffer_output() {
        let mut r = RenderPassReflection::new();
        r.add_output("counters", "").buffer(0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_merge_inherits_unknowns() {
        let mut consumer = Field::new("src", "", Visibility::INPUT);
        FieldBuilder::new(&mut consumer).bind_flags(BindFlags::SHADER_RESOURCE);

        let mut producer = Field::new("color", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut producer)
            .format(ResourceFormat::Rgba16Float)
            .size_policy(IoSize::Half)
            .bind_flags(BindFlags::RENDER_TARGET);

        consumer.merge(&producer).unwrap();
        assert_eq!(consumer.format(), ResourceFormat::Rgba16Float);
        assert_eq!(consumer.size_policy(), IoSize::Half);
        assert_eq!(
            consumer.bind_flags(),
            BindFlags::SHADER_RESOURCE | BindFlags::RENDER_TARGET
        );
    }

    #[test]
    fn test_merge_format_conflict() {
        let mut a = Field::new("a", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut a).format(ResourceFormat::Rgba8Unorm);
        let mut b = Field::new("b", "", Visibility::INPUT);
        FieldBuilder::new(&mut b).format(ResourceFormat::R32Float);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_size_conflict() {
        let mut a = Field::new("a", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut a).texture_2d(256, 256);
        let mut b = Field::new("b", "", Visibility::INPUT);
        FieldBuilder::new(&mut b).texture_2d(128, 128);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_kind_conflict() {
        let mut a = Field::new("a", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut a).buffer(64);
        let b = Field::new("b", "", Visibility::INPUT);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_optional_only_if_both_optional() {
        let mut a = Field::new("a", "", Visibility::INPUT);
        FieldBuilder::new(&mut a).optional();
        let b = Field::new("b", "", Visibility::OUTPUT);
        a.merge(&b).unwrap();
        assert!(!a.is_optional());
    }

    #[test]
    fn test_resolve_desc_defaults() {
        let field = Field::new("color", "", Visibility::OUTPUT);
        let desc = field.resolve_desc(Extent2d::new(100, 50), ResourceFormat::Rgba32Float);
        assert_eq!(desc.size, Extent3d::new_2d(100, 50));
        assert_eq!(desc.format, ResourceFormat::Rgba32Float);
    }

    #[test]
    fn test_resolve_desc_policies() {
        let mut field = Field::new("color", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut field).size_policy(IoSize::Half).format(ResourceFormat::Rgba8Unorm);
        let desc = field.resolve_desc(Extent2d::new(100, 50), ResourceFormat::Rgba32Float);
        assert_eq!(desc.size, Extent3d::new_2d(50, 25));
        assert_eq!(desc.format, ResourceFormat::Rgba8Unorm);

        let mut fixed = Field::new("lut", "", Visibility::INTERNAL);
        FieldBuilder::new(&mut fixed).texture_2d(32, 32).size_policy(IoSize::Fixed);
        let desc = fixed.resolve_desc(Extent2d::new(100, 50), ResourceFormat::Rgba32Float);
        assert_eq!(desc.size, Extent3d::new_2d(32, 32));
    }

    #[test]
    fn test_resolve_desc_buffer() {
        let mut field = Field::new("counters", "", Visibility::OUTPUT);
        FieldBuilder::new(&mut field).buffer(64).bind_flags(BindFlags::UNORDERED_ACCESS);
        let desc = field.resolve_desc(Extent2d::new(100, 50), ResourceFormat::Rgba32Float);
        assert_eq!(desc.kind, ResourceKind::Buffer);
        assert_eq!(desc.size.width, 64);
        assert_eq!(desc.format, ResourceFormat::Unknown);
    }
}
