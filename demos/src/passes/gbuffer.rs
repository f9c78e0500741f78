//! Rasterized G-buffer.

use std::sync::Arc;

use vesper_graphics::graph::{keys, RefreshFlags, Scene, Widgets};
use vesper_graphics::{
    BindFlags, ClearValue, CompileData, PassError, Properties, RenderContext, RenderData, RenderPass,
    RenderPassReflection, ResourceFormat,
};

const ADJUST_SHADING_NORMALS: &str = "adjust_shading_normals";

/// G-buffer channels: field name, description, format.
const CHANNELS: &[(&str, &str, ResourceFormat)] = &[
    ("posW", "Position in world space", ResourceFormat::Rgba32Float),
    ("normW", "Shading normal in world space", ResourceFormat::Rgba32Float),
    ("texC", "Texture coordinate", ResourceFormat::Rg32Float),
    ("mvec", "Motion vector", ResourceFormat::Rg32Float),
    ("mtlData", "Material ID and header", ResourceFormat::Rgba32Uint),
];

/// Rasterizes the scene into world-space G-buffer channels and a depth buffer.
pub struct GBufferRaster {
    adjust_shading_normals: bool,
    options_changed: bool,
    scene: Option<Arc<dyn Scene>>,
}

impl GBufferRaster {
    pub const TYPE_NAME: &'static str = "GBufferRaster";

    pub fn create(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        Ok(Box::new(Self {
            adjust_shading_normals: properties.get_bool(ADJUST_SHADING_NORMALS, true)?,
            options_changed: false,
            scene: None,
        }))
    }
}

impl RenderPass for GBufferRaster {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> &str {
        "Rasterized G-buffer"
    }

    fn properties(&self) -> Properties {
        Properties::new().with(ADJUST_SHADING_NORMALS, self.adjust_shading_normals)
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        for &(name, description, format) in CHANNELS {
            reflector.add_output(name, description).format(format);
        }
        reflector
            .add_output("depth", "Depth buffer")
            .format(ResourceFormat::Depth32Float)
            .bind_flags(BindFlags::DEPTH_STENCIL);
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        data.dictionary_mut()
            .insert(keys::GBUFFER_ADJUST_SHADING_NORMALS, self.adjust_shading_normals);
        if std::mem::take(&mut self.options_changed) {
            let flags = data
                .dictionary()
                .get_or(keys::REFRESH_FLAGS, RefreshFlags::empty());
            data.dictionary_mut()
                .insert(keys::REFRESH_FLAGS, flags | RefreshFlags::RENDER_OPTIONS_CHANGED);
        }

        let depth = data.require("depth")?;
        ctx.clear(depth, ClearValue::depth(1.0));
        let targets: Vec<_> = CHANNELS.iter().filter_map(|(name, _, _)| data.get(name)).collect();

        match &self.scene {
            Some(scene) => {
                let label = format!("gbuffer {}", scene.name());
                ctx.draw(&label, &[depth], &targets);
            }
            None => {
                for target in targets {
                    ctx.clear(target, ClearValue::color(0.0, 0.0, 0.0, 0.0));
                }
            }
        }
        Ok(())
    }

    fn set_scene(&mut self, scene: Option<Arc<dyn Scene>>) {
        self.scene = scene;
    }

    fn render_ui(&mut self, widgets: &mut dyn Widgets) {
        if widgets.checkbox("Adjust shading normals", &mut self.adjust_shading_normals) {
            self.options_changed = true;
        }
    }
}
