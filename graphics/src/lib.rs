//! # Vesper Graphics
//!
//! Render-graph compiler and executor.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - DAG of named render passes connected by named fields
//! - [`RenderPass`] - Contract implemented by every pass (reflect, execute, resize, ...)
//! - [`graph::ResourceCache`] - Owner of the graph's GPU resources, with transient aliasing
//! - [`Device`] - Narrow interface to the GPU, with [`DummyDevice`] for tests and tools
//! - [`EngineContext`] - Explicit owner of the device and the pass registry
//! - Import/export of graphs as TOML descriptions
//!
//! ## Example
//!
//! ```ignore
//! use vesper_graphics::{ChannelMask, DummyDevice, EngineContext, Properties};
//!
//! let mut engine = EngineContext::new(Box::new(DummyDevice::new()), MANIFEST);
//! let mut graph = engine.create_graph("forward");
//! graph.create_pass(engine.registry(), "gbuffer", "GBufferRaster", &Properties::new())?;
//! graph.create_pass(engine.registry(), "tonemap", "ToneMapper", &Properties::new())?;
//! graph.mark_output("tonemap.dst", ChannelMask::RGB)?;
//! engine.execute(&mut graph)?;
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendError, Device, DummyDevice, GpuResource};
pub use config::{ConfigError, GraphConfig};
pub use engine::EngineContext;
pub use error::{GraphError, GraphResult, PassError};
pub use graph::{
    ChannelMask, CompileData, PassId, PassRegistration, PassRegistry, Properties, RenderContext,
    RenderData, RenderGraph, RenderPass, RenderPassReflection,
};
pub use types::{
    BindFlags, ClearValue, Extent2d, Extent3d, ResourceDesc, ResourceFormat, ResourceKind,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only logs the version; kept so hosts have a single startup hook.
pub fn init() {
    log::info!("Vesper Graphics v{} initialized", VERSION);
}
