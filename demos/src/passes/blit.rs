//! Format-converting copy.

use vesper_graphics::{
    CompileData, PassError, Properties, RenderContext, RenderData, RenderPass, RenderPassReflection, ResourceFormat,
};

use super::{format_name, format_property};

const OUTPUT_FORMAT: &str = "output_format";

/// Copies `src` into `dst`. `dst` takes the graph's default format unless
/// `output_format` is set.
pub struct BlitPass {
    output_format: ResourceFormat,
}

impl BlitPass {
    pub const TYPE_NAME: &'static str = "BlitPass";

    pub fn create(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        Ok(Box::new(Self {
            output_format: format_property(properties, OUTPUT_FORMAT, ResourceFormat::Unknown)?,
        }))
    }
}

impl RenderPass for BlitPass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        if !self.output_format.is_unknown() {
            properties.set(OUTPUT_FORMAT, format_name(self.output_format));
        }
        properties
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_input("src", "The source texture");
        reflector
            .add_output("dst", "The destination texture")
            .format(self.output_format)
            .match_size_of("src");
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        ctx.copy(data.require("src")?, data.require("dst")?);
        Ok(())
    }
}
