//! Exposure and tone mapping.

use vesper_graphics::graph::{IoSize, Widgets};
use vesper_graphics::{
    BindFlags, CompileData, PassError, Properties, RenderContext, RenderData, RenderPass, RenderPassReflection,
    ResourceFormat,
};

use super::{format_name, format_property};

const EXPOSURE: &str = "exposure";
const OPERATOR: &str = "operator";
const AUTO_EXPOSURE: &str = "auto_exposure";
const OUTPUT_FORMAT: &str = "output_format";

/// Tone mapping curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Linear,
    Reinhard,
    Aces,
}

impl Operator {
    fn parse(name: &str) -> Result<Self, PassError> {
        match name {
            "linear" => Ok(Self::Linear),
            "reinhard" => Ok(Self::Reinhard),
            "aces" => Ok(Self::Aces),
            other => Err(PassError::InvalidProperty {
                name: OPERATOR.into(),
                reason: format!("unknown operator '{other}'"),
            }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Reinhard => "reinhard",
            Self::Aces => "aces",
        }
    }
}

/// Maps HDR radiance to a displayable image.
///
/// With auto exposure, average luminance is computed into a half-resolution
/// internal texture first.
pub struct ToneMapper {
    exposure: f32,
    operator: Operator,
    auto_exposure: bool,
    output_format: ResourceFormat,
}

impl ToneMapper {
    pub const TYPE_NAME: &'static str = "ToneMapper";

    pub fn create(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        Ok(Box::new(Self {
            exposure: properties.get_f32(EXPOSURE, 0.0)?,
            operator: Operator::parse(&properties.get_string(OPERATOR, "aces")?)?,
            auto_exposure: properties.get_bool(AUTO_EXPOSURE, false)?,
            output_format: format_property(properties, OUTPUT_FORMAT, ResourceFormat::Rgba8UnormSrgb)?,
        }))
    }
}

impl RenderPass for ToneMapper {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with(EXPOSURE, self.exposure)
            .with(OPERATOR, self.operator.name())
            .with(AUTO_EXPOSURE, self.auto_exposure)
            .with(OUTPUT_FORMAT, format_name(self.output_format))
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_input("src", "HDR image");
        reflector
            .add_output("dst", "Tone mapped image")
            .format(self.output_format)
            .match_size_of("src");
        if self.auto_exposure {
            reflector
                .add_internal("luminance", "Log luminance")
                .format(ResourceFormat::R32Float)
                .size_policy(IoSize::Half)
                .bind_flags(BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE);
        }
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        let src = data.require("src")?;
        let dst = data.require("dst")?;

        let mut inputs = vec![src];
        if let Some(luminance) = data.get("luminance") {
            ctx.draw("luminance", &[src], &[luminance]);
            inputs.push(luminance);
        }
        let label = format!("tonemap {} ev{:+.1}", self.operator.name(), self.exposure);
        ctx.draw(&label, &inputs, &[dst]);
        Ok(())
    }

    fn render_ui(&mut self, widgets: &mut dyn Widgets) {
        widgets.slider("Exposure", &mut self.exposure, -10.0, 10.0);
        widgets.checkbox("Auto exposure", &mut self.auto_exposure);
        widgets.text(&format!("Operator: {}", self.operator.name()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_property() {
        let props = Properties::new().with(OPERATOR, "reinhard").with(EXPOSURE, 1.5);
        let pass = ToneMapper::create(&props).unwrap();
        let round = pass.properties();
        assert_eq!(round.get_string(OPERATOR, "").unwrap(), "reinhard");
        assert_eq!(round.get_f32(EXPOSURE, 0.0).unwrap(), 1.5);
        assert_eq!(round.get_string(OUTPUT_FORMAT, "").unwrap(), "Rgba8UnormSrgb");

        let props = Properties::new().with(OPERATOR, "filmic");
        assert!(matches!(
            ToneMapper::create(&props),
            Err(PassError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn test_auto_exposure_adds_internal_field() {
        let data = CompileData::default();
        let plain = ToneMapper::create(&Properties::new()).unwrap();
        assert!(plain.reflect(&data).unwrap().field("luminance").is_none());

        let auto = ToneMapper::create(&Properties::new().with(AUTO_EXPOSURE, true)).unwrap();
        let reflection = auto.reflect(&data).unwrap();
        let luminance = reflection.field("luminance").unwrap();
        assert!(luminance.is_internal());
        assert_eq!(luminance.size_policy(), IoSize::Half);
    }
}
