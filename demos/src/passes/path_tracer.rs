//! Minimal path tracer reading a G-buffer.

use vesper_graphics::graph::{keys, HotReloadFlags, RefreshFlags, Widgets};
use vesper_graphics::{
    CompileData, Extent2d, PassError, Properties, RenderContext, RenderData, RenderPass, RenderPassReflection,
    ResourceFormat,
};

const SAMPLES_PER_PIXEL: &str = "samples_per_pixel";
const MAX_BOUNCES: &str = "max_bounces";

/// Thread group edge length of the trace dispatch.
const GROUP_SIZE: u32 = 16;

/// Traces one or more paths per pixel starting from the G-buffer hit.
pub struct PathTracer {
    samples_per_pixel: u32,
    max_bounces: u32,
    frame_dims: Extent2d,
    options_changed: bool,
}

impl PathTracer {
    pub const TYPE_NAME: &'static str = "PathTracer";

    pub fn create(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        let samples_per_pixel = properties.get_u32(SAMPLES_PER_PIXEL, 1)?;
        if samples_per_pixel == 0 {
            return Err(PassError::InvalidProperty {
                name: SAMPLES_PER_PIXEL.into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(Box::new(Self {
            samples_per_pixel,
            max_bounces: properties.get_u32(MAX_BOUNCES, 3)?,
            frame_dims: Extent2d::default(),
            options_changed: false,
        }))
    }
}

impl RenderPass for PathTracer {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with(SAMPLES_PER_PIXEL, self.samples_per_pixel)
            .with(MAX_BOUNCES, self.max_bounces)
    }

    fn reflect(&self, data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_input("posW", "Position in world space");
        reflector.add_input("normW", "Shading normal in world space");
        reflector.add_input("mtlData", "Material ID and header");
        reflector
            .add_output("color", "Radiance estimate")
            .format(ResourceFormat::Rgba32Float);

        // One u32 random state per pixel.
        let pixels = data.default_dims.width.max(1) * data.default_dims.height.max(1);
        reflector.add_internal("rngState", "Per-pixel random state").buffer(pixels * 4);
        Ok(reflector)
    }

    fn compile(&mut self, data: &CompileData) -> Result<(), PassError> {
        let color = data
            .connected_resources
            .field("color")
            .ok_or_else(|| PassError::MissingResource("color".into()))?;
        self.frame_dims = Extent2d::new(color.width(), color.height());
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        let dimension = data.dictionary().get_or(keys::PRNG_DIMENSION, 0u32);
        data.dictionary_mut()
            .insert(keys::PRNG_DIMENSION, dimension + 2 * self.max_bounces);
        if std::mem::take(&mut self.options_changed) {
            let flags = data
                .dictionary()
                .get_or(keys::REFRESH_FLAGS, RefreshFlags::empty());
            data.dictionary_mut()
                .insert(keys::REFRESH_FLAGS, flags | RefreshFlags::RENDER_OPTIONS_CHANGED);
        }

        let resources = [
            data.require("posW")?,
            data.require("normW")?,
            data.require("mtlData")?,
            data.require("rngState")?,
            data.require("color")?,
        ];
        let groups = [
            self.frame_dims.width.div_ceil(GROUP_SIZE),
            self.frame_dims.height.div_ceil(GROUP_SIZE),
            self.samples_per_pixel,
        ];
        ctx.dispatch("path tracer", groups, &resources);
        Ok(())
    }

    fn render_ui(&mut self, widgets: &mut dyn Widgets) {
        let mut bounces = self.max_bounces as f32;
        if widgets.slider("Max bounces", &mut bounces, 0.0, 16.0) {
            self.max_bounces = bounces.round() as u32;
            self.options_changed = true;
        }
        widgets.text(&format!("{} spp", self.samples_per_pixel));
    }

    fn on_hot_reload(&mut self, flags: HotReloadFlags) {
        if flags.contains(HotReloadFlags::PROGRAM) {
            log::info!("Path tracer programs reloaded");
            self.options_changed = true;
        }
    }
}
