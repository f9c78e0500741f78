//! Explicitly constructed engine state.
//!
//! [`EngineContext`] owns the device and the pass registry. It is created
//! once at startup and passed to whatever builds, executes and tears down
//! render graphs; there are no process-wide singletons.

use std::path::Path;

use crate::backend::Device;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::graph::{
    PassRegistration, PassRegistry, Properties, RenderContext, RenderGraph, RenderGraphImporter, RenderPass,
};

/// Device, pass registry and graph defaults.
pub struct EngineContext {
    device: Box<dyn Device>,
    registry: PassRegistry,
    config: GraphConfig,
}

impl EngineContext {
    /// Create a context from a device and a fixed pass manifest.
    pub fn new(device: Box<dyn Device>, manifest: &[PassRegistration]) -> Self {
        Self::with_config(device, manifest, GraphConfig::default())
    }

    /// Create a context with explicit graph defaults.
    pub fn with_config(device: Box<dyn Device>, manifest: &[PassRegistration], config: GraphConfig) -> Self {
        let registry = PassRegistry::from_manifest(manifest);
        log::info!(
            "Engine context on '{}' with {} pass types",
            device.name(),
            registry.len()
        );
        Self {
            device,
            registry,
            config,
        }
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Start recording commands on the device.
    pub fn render_context(&mut self) -> RenderContext<'_> {
        RenderContext::new(self.device.as_mut())
    }

    /// Construct a registered pass.
    pub fn create_pass(&self, type_name: &str, properties: &Properties) -> GraphResult<Box<dyn RenderPass>> {
        self.registry.create(type_name, properties)
    }

    /// Create an empty graph using the context defaults.
    pub fn create_graph(&self, name: &str) -> RenderGraph {
        RenderGraph::with_config(name, &self.config)
    }

    /// Import a graph description. See [`RenderGraphImporter::import`].
    pub fn import_graph(&self, graph_name: &str, path: &Path, func_name: &str) -> Option<RenderGraph> {
        RenderGraphImporter::import(&self.registry, &self.config, graph_name, path, func_name)
    }

    /// Import every graph of a description file.
    pub fn import_all_graphs(&self, path: &Path) -> Vec<RenderGraph> {
        RenderGraphImporter::import_all_graphs(&self.registry, &self.config, path)
    }

    /// Execute one frame of `graph` and submit the recorded commands.
    ///
    /// Commands recorded before a pass failure are still submitted.
    pub fn execute(&mut self, graph: &mut RenderGraph) -> GraphResult<()> {
        let mut ctx = self.render_context();
        let result = graph.execute(&mut ctx);
        ctx.flush().map_err(GraphError::Submit)?;
        result
    }

    /// Destroy the resources of a graph that is about to be dropped.
    pub fn release_graph(&mut self, graph: &mut RenderGraph) {
        graph.release_resources(self.device.as_mut());
    }

    /// Wait for the device and give it back.
    pub fn shutdown(mut self) -> Box<dyn Device> {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device did not go idle on shutdown: {e}");
        }
        self.device
    }
}
