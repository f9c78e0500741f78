//! Sample render passes.

mod accumulate;
mod blit;
mod gbuffer;
mod path_tracer;
mod tone_mapper;

pub use accumulate::AccumulatePass;
pub use blit::BlitPass;
pub use gbuffer::GBufferRaster;
pub use path_tracer::PathTracer;
pub use tone_mapper::ToneMapper;

use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use vesper_graphics::{PassError, Properties, ResourceFormat};

/// Read a format property written as its variant name, e.g. `"Rgba16Float"`.
pub(crate) fn format_property(
    properties: &Properties,
    name: &str,
    default: ResourceFormat,
) -> Result<ResourceFormat, PassError> {
    if !properties.contains(name) {
        return Ok(default);
    }
    let text = properties.get_string(name, "")?;
    let deserializer: StrDeserializer<'_, ValueError> = text.as_str().into_deserializer();
    ResourceFormat::deserialize(deserializer).map_err(|e| PassError::InvalidProperty {
        name: name.to_owned(),
        reason: e.to_string(),
    })
}

/// Inverse of [`format_property`].
pub(crate) fn format_name(format: ResourceFormat) -> String {
    format!("{format:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_property() {
        let props = Properties::new().with("format", "Rgba16Float");
        assert_eq!(
            format_property(&props, "format", ResourceFormat::Unknown).unwrap(),
            ResourceFormat::Rgba16Float
        );
        assert_eq!(
            format_property(&Properties::new(), "format", ResourceFormat::R8Unorm).unwrap(),
            ResourceFormat::R8Unorm
        );

        let props = Properties::new().with("format", "NotAFormat");
        assert!(matches!(
            format_property(&props, "format", ResourceFormat::Unknown),
            Err(PassError::InvalidProperty { .. })
        ));
        assert_eq!(format_name(ResourceFormat::Rgba8UnormSrgb), "Rgba8UnormSrgb");
    }
}
