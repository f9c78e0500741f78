//! # Vesper Demos
//!
//! Sample render passes and graph descriptions for the Vesper render graph.
//!
//! ## Available Passes
//!
//! - `GBufferRaster` - Rasterizes the scene into world-space G-buffer channels
//! - `PathTracer` - Traces the G-buffer into a noisy radiance image
//! - `AccumulatePass` - Averages frames until the image or the options change
//! - `ToneMapper` - Maps HDR radiance to a displayable format
//! - `BlitPass` - Copies one texture into another with a format conversion
//!
//! ## Available Binaries
//!
//! - `graph_runner` - Imports a graph description and runs it headless

pub mod passes;

use vesper_graphics::graph::PassRegistration;

pub use passes::{AccumulatePass, BlitPass, GBufferRaster, PathTracer, ToneMapper};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every pass type of this crate.
pub const MANIFEST: &[PassRegistration] = &[
    PassRegistration {
        type_name: GBufferRaster::TYPE_NAME,
        description: "Rasterized G-buffer",
        create: GBufferRaster::create,
    },
    PassRegistration {
        type_name: PathTracer::TYPE_NAME,
        description: "Minimal path tracer reading a G-buffer",
        create: PathTracer::create,
    },
    PassRegistration {
        type_name: AccumulatePass::TYPE_NAME,
        description: "Temporal accumulation of a noisy image",
        create: AccumulatePass::create,
    },
    PassRegistration {
        type_name: ToneMapper::TYPE_NAME,
        description: "Exposure and tone mapping",
        create: ToneMapper::create,
    },
    PassRegistration {
        type_name: BlitPass::TYPE_NAME,
        description: "Copy with format conversion",
        create: BlitPass::create,
    },
];
