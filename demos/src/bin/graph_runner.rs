//! Headless render graph runner.
//!
//! Imports a graph description, runs it for a number of frames on the dummy
//! device and optionally exports it again.
//!
//! ```text
//! graph_runner --graph path_tracer.toml --frames 4 --resize 1280x720
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vesper_demos::MANIFEST;
use vesper_graphics::graph::RenderGraphExporter;
use vesper_graphics::{DummyDevice, EngineContext, GraphConfig, RenderGraph};

/// Run a render graph description headless.
#[derive(Parser, Debug)]
#[command(
    name = "graph_runner",
    about = "Import a render graph description and run it on the dummy device",
    version
)]
struct Args {
    /// Graph description file. Relative paths also go through the config's search paths.
    #[arg(long, default_value = "path_tracer.toml")]
    graph: PathBuf,

    /// Name of the graph to import. Defaults to the file stem of `--graph`.
    #[arg(long)]
    name: Option<String>,

    /// Function name of the graph to pick from a file with several graphs.
    #[arg(long, default_value = "")]
    function: String,

    /// Graph configuration file.
    #[arg(long, default_value = "vesper.toml")]
    config: PathBuf,

    /// Frames to run before and after the optional resize.
    #[arg(long, default_value = "1")]
    frames: u32,

    /// Default width, overriding the configuration.
    #[arg(long)]
    width: Option<u32>,

    /// Default height, overriding the configuration.
    #[arg(long)]
    height: Option<u32>,

    /// Resize to WIDTHxHEIGHT after the first batch of frames.
    #[arg(long, value_parser = parse_size)]
    resize: Option<(u32, u32)>,

    /// Write the graph back out to this file before exiting.
    #[arg(long)]
    export: Option<PathBuf>,

    /// List the registered pass types and exit.
    #[arg(long)]
    list_passes: bool,
}

fn parse_size(text: &str) -> Result<(u32, u32), String> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let width = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((width, height))
}

fn load_config(args: &Args) -> GraphConfig {
    let mut config = GraphConfig::load_or_default(&args.config);
    if let Some(width) = args.width {
        config.default_width = width;
    }
    if let Some(height) = args.height {
        config.default_height = height;
    }
    let bundled = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("graphs");
    if !config.search_paths.contains(&bundled) {
        config.search_paths.push(bundled);
    }
    config
}

fn run_frames(engine: &mut EngineContext, graph: &mut RenderGraph, frames: u32) -> bool {
    for frame in 0..frames {
        if let Err(e) = engine.execute(graph) {
            log::error!("Frame {frame} of '{}' failed: {e}", graph.name());
            return false;
        }
    }
    true
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    vesper_graphics::init();

    let config = load_config(&args);
    let mut engine = EngineContext::with_config(Box::new(DummyDevice::new()), MANIFEST, config);

    if args.list_passes {
        for registration in engine.registry().registered_types() {
            println!("{:<16} {}", registration.type_name, registration.description);
        }
        return ExitCode::SUCCESS;
    }

    let graph_name = args.name.clone().unwrap_or_else(|| {
        args.graph
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let Some(mut graph) = engine.import_graph(&graph_name, &args.graph, &args.function) else {
        log::error!("Could not import a graph from {}", args.graph.display());
        return ExitCode::FAILURE;
    };

    let mut ok = run_frames(&mut engine, &mut graph, args.frames);
    if ok {
        if let Some((width, height)) = args.resize {
            graph.on_resize(width, height);
            ok = run_frames(&mut engine, &mut graph, args.frames);
        }
    }

    if ok {
        log::info!(
            "Graph '{}' ran with pass order [{}]",
            graph.name(),
            graph.execution_order().join(", ")
        );
        for output in graph.outputs() {
            if let Some(resource) = graph.get_output(&output.name()) {
                log::info!(
                    "  {} -> {}x{} {:?}",
                    output.name(),
                    resource.width(),
                    resource.height(),
                    resource.format()
                );
            }
        }
    }

    if let Some(path) = &args.export {
        if RenderGraphExporter::save(&graph, path) {
            log::info!("Exported '{}' to {}", graph.name(), path.display());
        } else {
            ok = false;
        }
    }

    engine.release_graph(&mut graph);
    engine.shutdown();

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("64X32"), Ok((64, 32)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("ax2").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["graph_runner", "--graph", "forward.toml", "--resize", "8x4", "--frames", "2"]);
        assert_eq!(args.graph, PathBuf::from("forward.toml"));
        assert_eq!(args.resize, Some((8, 4)));
        assert_eq!(args.frames, 2);
        assert!(args.name.is_none());
    }
}
