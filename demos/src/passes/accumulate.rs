//! Temporal accumulation.

use vesper_graphics::graph::{keys, RefreshFlags, Widgets};
use vesper_graphics::{
    CompileData, Extent2d, PassError, Properties, RenderContext, RenderData, RenderPass, RenderPassReflection,
    ResourceFormat,
};

const ENABLED: &str = "enabled";
const MAX_FRAMES: &str = "max_frames";

/// Averages its input over consecutive frames.
///
/// The running sum lives in a persistent internal resource. It is reset on
/// resize and whenever an earlier pass raises [`RefreshFlags`] in the
/// dictionary. With `max_frames` set, accumulation stops once that many
/// frames were averaged.
pub struct AccumulatePass {
    enabled: bool,
    max_frames: u32,
    frame_count: u32,
}

impl AccumulatePass {
    pub const TYPE_NAME: &'static str = "AccumulatePass";

    pub fn create(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
        Ok(Box::new(Self {
            enabled: properties.get_bool(ENABLED, true)?,
            max_frames: properties.get_u32(MAX_FRAMES, 0)?,
            frame_count: 0,
        }))
    }

    /// Frames averaged since the last reset.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn reset(&mut self) {
        if self.frame_count > 0 {
            log::debug!("Accumulation reset after {} frames", self.frame_count);
        }
        self.frame_count = 0;
    }
}

impl RenderPass for AccumulatePass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> &str {
        "Temporal accumulation of a noisy image"
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with(ENABLED, self.enabled)
            .with(MAX_FRAMES, self.max_frames)
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_input("input", "Noisy image");
        reflector
            .add_output("output", "Accumulated image")
            .format(ResourceFormat::Rgba32Float)
            .match_size_of("input");
        reflector
            .add_internal("history", "Running sum")
            .format(ResourceFormat::Rgba32Float)
            .match_size_of("input")
            .persistent();
        Ok(reflector)
    }

    fn compile(&mut self, _data: &CompileData) -> Result<(), PassError> {
        self.reset();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        let flags = data
            .dictionary()
            .get_or(keys::REFRESH_FLAGS, RefreshFlags::empty());
        if !flags.is_empty() {
            data.dictionary_mut().remove(keys::REFRESH_FLAGS);
            self.reset();
        }

        let input = data.require("input")?;
        let output = data.require("output")?;
        if !self.enabled {
            ctx.copy(input, output);
            return Ok(());
        }

        let history = data.require("history")?;
        let saturated = self.max_frames != 0 && self.frame_count >= self.max_frames;
        if saturated {
            ctx.copy(history, output);
        } else {
            let groups = [input.width().div_ceil(16), input.height().div_ceil(16), 1];
            ctx.dispatch("accumulate", groups, &[input, history, output]);
            self.frame_count += 1;
        }
        Ok(())
    }

    fn on_resize(&mut self, _size: Extent2d) {
        self.reset();
    }

    fn render_ui(&mut self, widgets: &mut dyn Widgets) {
        if widgets.checkbox("Enabled", &mut self.enabled) {
            self.reset();
        }
        widgets.text(&format!("Frames accumulated: {}", self.frame_count));
    }
}
