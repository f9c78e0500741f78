//! Graph description import/export tests.
//!
//! Graphs are built through a [`PassRegistry`], exported as TOML and
//! imported again; the re-imported graph must have the same passes,
//! properties, edges and marked outputs.

mod common;

use std::path::{Path, PathBuf};

use rstest::rstest;

use common::{init_logging, MANIFEST};
use vesper_graphics::graph::{
    default_function_name, GraphFile, RenderGraphExporter, RenderGraphImporter,
};
use vesper_graphics::{
    ChannelMask, DummyDevice, EngineContext, GraphConfig, GraphError, PassRegistry, Properties, RenderGraph,
};

fn build_graph(registry: &PassRegistry, mask: ChannelMask) -> RenderGraph {
    let mut graph = RenderGraph::with_config("post fx", &GraphConfig::default());
    graph
        .create_pass(registry, "source", "Source", &Properties::new())
        .unwrap();
    graph
        .create_pass(registry, "blur", "Filter", &Properties::new().with("strength", 0.5))
        .unwrap();
    graph
        .create_pass(registry, "sharpen", "Filter", &Properties::new().with("strength", 2.0))
        .unwrap();
    graph.add_edge("source.color", "blur.src").unwrap();
    graph.add_edge("blur.dst", "sharpen.src").unwrap();
    graph.mark_output("sharpen.dst", mask).unwrap();
    graph
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vesper_import_export_{name}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[rstest]
#[case::rgb(ChannelMask::RGB)]
#[case::rgba(ChannelMask::RGBA)]
#[case::red(ChannelMask::RED)]
fn test_export_import_roundtrip(#[case] mask: ChannelMask) {
    init_logging();
    let registry = PassRegistry::from_manifest(MANIFEST);
    let config = GraphConfig::default();
    let mut original = build_graph(&registry, mask);

    let text = RenderGraphExporter::to_toml_string(&original).unwrap();
    let mut imported =
        RenderGraphImporter::import_from_str(&registry, &config, &text, original.name(), "").unwrap();

    assert_eq!(imported.name(), original.name());
    assert_eq!(
        RenderGraphExporter::get_ir(&imported),
        RenderGraphExporter::get_ir(&original)
    );
    assert_eq!(imported.outputs()[0].mask(), mask);

    original.compile().unwrap();
    imported.compile().unwrap();
    assert_eq!(imported.execution_order(), original.execution_order());
    assert_eq!(imported.execution_order(), vec!["source", "blur", "sharpen"]);
}

#[test]
fn test_exported_text_layout() {
    let registry = PassRegistry::from_manifest(MANIFEST);
    let graph = build_graph(&registry, ChannelMask::RGB);
    let text = RenderGraphExporter::to_toml_string(&graph).unwrap();

    let file = GraphFile::from_toml_str(&text).unwrap();
    assert_eq!(file.graphs.len(), 1);
    let description = &file.graphs[0];
    assert_eq!(description.name, "post fx");
    assert_eq!(description.function_name(), "render_graph_post_fx");
    assert_eq!(description.passes.len(), 3);
    assert_eq!(description.passes[1].type_name, "Filter");
    assert_eq!(
        description.passes[1].properties.get_f32("strength", 0.0).unwrap(),
        0.5
    );
    assert!(description.passes[0].properties.is_empty());
    assert_eq!(description.edges[0].src, "source.color");
    assert_eq!(description.outputs[0].name, "sharpen.dst");
    assert_eq!(description.outputs[0].mask, None);
}

#[test]
fn test_save_and_import_file() {
    let registry = PassRegistry::from_manifest(MANIFEST);
    let dir = temp_dir("save");
    let path = dir.join("post.toml");
    let graph = build_graph(&registry, ChannelMask::RGBA);

    assert!(RenderGraphExporter::save(&graph, &path));

    let config = GraphConfig::default();
    let imported = RenderGraphImporter::import(&registry, &config, "post fx", &path, "").unwrap();
    assert_eq!(imported.pass_count(), 3);
    assert!(imported.is_output("sharpen.dst"));

    // Relative paths go through the search paths.
    let config = GraphConfig {
        search_paths: vec![dir.clone()],
        ..GraphConfig::default()
    };
    let imported = RenderGraphImporter::import(&registry, &config, "post fx", Path::new("post.toml"), "");
    assert!(imported.is_some());
}

#[test]
fn test_import_all_skips_broken_graphs() {
    init_logging();
    let registry = PassRegistry::from_manifest(MANIFEST);
    let dir = temp_dir("all");
    let path = dir.join("graphs.toml");
    std::fs::write(
        &path,
        r#"
[[graph]]
name = "good"

[[graph.pass]]
name = "source"
type = "Source"

[[graph.output]]
name = "source.color"

[[graph]]
name = "unknown type"

[[graph.pass]]
name = "mystery"
type = "DoesNotExist"

[[graph]]
name = "bad property"

[[graph.pass]]
name = "blur"
type = "Filter"
properties = { strength = -1.0 }
"#,
    )
    .unwrap();

    let graphs = RenderGraphImporter::import_all_graphs(&registry, &GraphConfig::default(), &path);
    assert_eq!(graphs.len(), 1);
    assert_eq!(graphs[0].name(), "good");
}

#[test]
fn test_import_failures_return_none() {
    init_logging();
    let registry = PassRegistry::from_manifest(MANIFEST);
    let config = GraphConfig::default();

    // Missing file.
    assert!(RenderGraphImporter::import(&registry, &config, "nothing", Path::new("missing.toml"), "").is_none());

    // Malformed text.
    assert!(RenderGraphImporter::import_from_str(&registry, &config, "[[graph", "x", "").is_none());

    // No graph with that function name.
    let text = r#"
[[graph]]
name = "present"
"#;
    assert!(RenderGraphImporter::import_from_str(&registry, &config, text, "present", "render_graph_absent").is_none());
    assert!(RenderGraphImporter::import_from_str(&registry, &config, text, "present", "").is_some());

    // Edge to a field the pass does not have.
    let text = r#"
[[graph]]
name = "broken"

[[graph.pass]]
name = "source"
type = "Source"

[[graph.pass]]
name = "blur"
type = "Filter"

[[graph.edge]]
src = "source.depth"
dst = "blur.src"
"#;
    assert!(RenderGraphImporter::import_from_str(&registry, &config, text, "broken", "").is_none());

    // Unknown channel name in an output mask.
    let text = r#"
[[graph]]
name = "mask"

[[graph.pass]]
name = "source"
type = "Source"

[[graph.output]]
name = "source.color"
mask = ["red", "purple"]
"#;
    assert!(RenderGraphImporter::import_from_str(&registry, &config, text, "mask", "").is_none());
}

#[test]
fn test_explicit_function_name() {
    let registry = PassRegistry::from_manifest(MANIFEST);
    let text = r#"
[[graph]]
name = "first"
function = "make_first"

[[graph.pass]]
name = "source"
type = "Source"

[[graph]]
name = "second"
"#;
    let graph = RenderGraphImporter::import_from_str(
        &registry,
        &GraphConfig::default(),
        text,
        "renamed",
        "make_first",
    )
    .unwrap();
    assert_eq!(graph.name(), "renamed");
    assert_eq!(graph.pass_count(), 1);
    assert_eq!(default_function_name("a b/c"), "render_graph_a_b_c");
}

#[test]
fn test_update_pass_rebuilds_from_registry() {
    let registry = PassRegistry::from_manifest(MANIFEST);
    let mut graph = build_graph(&registry, ChannelMask::RGB);

    let report = graph
        .update_pass(&registry, "blur", &Properties::new().with("strength", 4.0))
        .unwrap();
    assert!(report.is_clean());
    let ir = RenderGraphExporter::get_ir(&graph);
    assert_eq!(
        ir.description().passes[1].properties.get_f32("strength", 0.0).unwrap(),
        4.0
    );

    assert!(matches!(
        graph.update_pass(&registry, "blur", &Properties::new().with("strength", -3.0)),
        Err(GraphError::PassCreation { .. })
    ));
    assert!(matches!(
        graph.update_pass(&registry, "missing", &Properties::new()),
        Err(GraphError::UnknownPass(_))
    ));
}

#[test]
fn test_engine_imports_and_executes() {
    init_logging();
    let dir = temp_dir("engine");
    let path = dir.join("engine.toml");
    std::fs::write(
        &path,
        r#"
[[graph]]
name = "engine"

[[graph.pass]]
name = "source"
type = "Source"

[[graph.pass]]
name = "blur"
type = "Filter"

[[graph.edge]]
src = "source.color"
dst = "blur.src"

[[graph.output]]
name = "blur.dst"
"#,
    )
    .unwrap();

    let config = GraphConfig {
        default_width: 48,
        default_height: 32,
        ..GraphConfig::default()
    };
    let mut engine = EngineContext::with_config(Box::new(DummyDevice::new()), MANIFEST, config);
    let mut graph = engine.import_graph("engine", &path, "").unwrap();

    // `blur.dst` matches the size of `blur.src`, which takes the default.
    engine.execute(&mut graph).unwrap();
    assert_eq!(graph.execution_order(), vec!["source", "blur"]);
    let output = graph.get_output("blur.dst").unwrap();
    assert_eq!((output.width(), output.height()), (48, 32));
    engine.release_graph(&mut graph);
}
