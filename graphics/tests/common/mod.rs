//! Common utilities for render graph integration tests.
//!
//! [`TestPass`] is a configurable pass that declares whatever fields a test
//! needs and appends its name to a shared [`ExecutionLog`] when it runs.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use vesper_graphics::graph::{IoSize, PassRegistration, RenderContext};
use vesper_graphics::{
    ClearValue, CompileData, PassError, Properties, RenderData, RenderPass, RenderPassReflection,
    ResourceFormat,
};

/// Names of the passes that executed, in order.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_log() -> ExecutionLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the execution log.
pub fn executed(log: &ExecutionLog) -> Vec<String> {
    log.lock().clone()
}

#[derive(Debug, Clone)]
struct OutputSpec {
    name: String,
    format: ResourceFormat,
    size: IoSize,
    persistent: bool,
}

// ============================================================================
// Configurable pass
// ============================================================================

/// A pass whose fields are configured by the test.
#[derive(Clone)]
pub struct TestPass {
    inputs: Vec<(String, ResourceFormat)>,
    optional_inputs: Vec<String>,
    outputs: Vec<OutputSpec>,
    fail: bool,
    side_effects: bool,
    log: ExecutionLog,
}

impl TestPass {
    pub fn new(log: &ExecutionLog) -> Self {
        Self {
            inputs: Vec::new(),
            optional_inputs: Vec::new(),
            outputs: Vec::new(),
            fail: false,
            side_effects: false,
            log: Arc::clone(log),
        }
    }

    pub fn input(self, name: &str) -> Self {
        self.input_with(name, ResourceFormat::Unknown)
    }

    /// Input that only accepts `format`.
    pub fn input_with(mut self, name: &str, format: ResourceFormat) -> Self {
        self.inputs.push((name.to_owned(), format));
        self
    }

    pub fn optional_input(mut self, name: &str) -> Self {
        self.optional_inputs.push(name.to_owned());
        self
    }

    /// Default-sized output with an unspecified format.
    pub fn output(self, name: &str) -> Self {
        self.output_with(name, ResourceFormat::Unknown, IoSize::Default)
    }

    pub fn output_with(mut self, name: &str, format: ResourceFormat, size: IoSize) -> Self {
        self.outputs.push(OutputSpec {
            name: name.to_owned(),
            format,
            size,
            persistent: false,
        });
        self
    }

    pub fn persistent_output(mut self, name: &str) -> Self {
        self.outputs.push(OutputSpec {
            name: name.to_owned(),
            format: ResourceFormat::Unknown,
            size: IoSize::Default,
            persistent: true,
        });
        self
    }

    /// Make `execute` return an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_side_effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    pub fn boxed(self) -> Box<dyn RenderPass> {
        Box::new(self)
    }
}

impl RenderPass for TestPass {
    fn type_name(&self) -> &str {
        "TestPass"
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        for (name, format) in &self.inputs {
            reflector.add_input(name, "").format(*format);
        }
        for name in &self.optional_inputs {
            reflector.add_input(name, "").optional();
        }
        for spec in &self.outputs {
            let field = reflector
                .add_output(&spec.name, "")
                .format(spec.format)
                .size_policy(spec.size);
            if spec.persistent {
                field.persistent();
            }
        }
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        self.log.lock().push(data.pass_name().to_owned());
        if self.fail {
            return Err(PassError::msg("injected failure"));
        }

        let inputs: Vec<_> = self.inputs.iter().filter_map(|(name, _)| data.get(name)).collect();
        let targets: Vec<_> = self
            .outputs
            .iter()
            .filter_map(|spec| data.get(&spec.name))
            .collect();
        ctx.draw(data.pass_name(), &inputs, &targets);
        Ok(())
    }

    fn has_side_effects(&self) -> bool {
        self.side_effects
    }
}

// ============================================================================
// Registered passes
// ============================================================================

/// Produces `color`.
pub struct SourcePass {
    properties: Properties,
}

impl RenderPass for SourcePass {
    fn type_name(&self) -> &str {
        "Source"
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_output("color", "Generated image");
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        ctx.clear(data.require("color")?, ClearValue::color(1.0, 0.0, 0.0, 1.0));
        Ok(())
    }
}

/// Reads `src` and writes `dst`, scaled by the `strength` property.
pub struct FilterPass {
    strength: f32,
    properties: Properties,
}

impl RenderPass for FilterPass {
    fn type_name(&self) -> &str {
        "Filter"
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        reflector.add_input("src", "Filter input");
        reflector.add_output("dst", "Filtered image").match_size_of("src");
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        let label = format!("filter x{}", self.strength);
        ctx.draw(&label, &[data.require("src")?], &[data.require("dst")?]);
        Ok(())
    }
}

fn create_source(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
    Ok(Box::new(SourcePass {
        properties: properties.clone(),
    }))
}

fn create_filter(properties: &Properties) -> Result<Box<dyn RenderPass>, PassError> {
    let strength = properties.get_f32("strength", 1.0)?;
    if strength < 0.0 {
        return Err(PassError::InvalidProperty {
            name: "strength".into(),
            reason: "must not be negative".into(),
        });
    }
    Ok(Box::new(FilterPass {
        strength,
        properties: properties.clone(),
    }))
}

/// Pass types available to import tests.
pub const MANIFEST: &[PassRegistration] = &[
    PassRegistration {
        type_name: "Source",
        description: "Produces a color image",
        create: create_source,
    },
    PassRegistration {
        type_name: "Filter",
        description: "Filters an image",
        create: create_filter,
    },
];
