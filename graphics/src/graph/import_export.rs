//! Loading and saving render graphs as TOML descriptions.
//!
//! A description file holds one or more graphs:
//!
//! ```toml
//! [[graph]]
//! name = "forward"
//! function = "render_graph_forward"   # optional
//!
//! [[graph.pass]]
//! name = "gbuffer"
//! type = "GBufferRaster"
//!
//! [[graph.pass]]
//! name = "tonemap"
//! type = "ToneMapper"
//! properties = { exposure = 1.5 }
//!
//! [[graph.edge]]
//! src = "gbuffer.diffuse"
//! dst = "tonemap.src"
//!
//! [[graph.output]]
//! name = "tonemap.dst"
//! mask = ["red", "green", "blue"]    # optional
//! ```
//!
//! Each graph is addressed by its constructor function name, which defaults
//! to `render_graph_<name>`. The description is plain data: the importer
//! replays it against a [`PassRegistry`], and the exporter records the
//! current topology of a [`RenderGraph`] through a [`RenderGraphIr`].
//!
//! Import and export never fail loudly: problems are logged and reported as
//! `None`/`false` so callers can try another way of building their graph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GraphConfig;
use crate::error::GraphError;

use super::properties::Properties;
use super::registry::PassRegistry;
use super::{ChannelMask, RenderGraph};

/// Errors reading, writing or replaying a graph description.
#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse graph description: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize graph description: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no graph description file found for '{0}'")]
    NotFound(PathBuf),
    #[error("unknown channel in output mask of '{0}'")]
    InvalidMask(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A pass record: name, registered type and construction properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

/// An edge record, endpoints written as for [`RenderGraph::add_edge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub src: String,
    pub dst: String,
}

/// A marked output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescription {
    pub name: String,
    /// Channel names; RGB when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<String>>,
}

/// A complete graph: ordered passes, edges and marked outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub name: String,
    /// Constructor function name; `render_graph_<name>` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, rename = "pass")]
    pub passes: Vec<PassDescription>,
    #[serde(default, rename = "edge")]
    pub edges: Vec<EdgeDescription>,
    #[serde(default, rename = "output")]
    pub outputs: Vec<OutputDescription>,
}

impl GraphDescription {
    /// Effective constructor function name.
    pub fn function_name(&self) -> String {
        self.function
            .clone()
            .unwrap_or_else(|| default_function_name(&self.name))
    }

    /// Replay the description into a new graph.
    pub fn build(&self, registry: &PassRegistry, config: &GraphConfig) -> Result<RenderGraph, DescriptionError> {
        let mut graph = RenderGraph::with_config(&self.name, config);
        for pass in &self.passes {
            graph.create_pass(registry, &pass.name, &pass.type_name, &pass.properties)?;
        }
        for edge in &self.edges {
            graph.add_edge(&edge.src, &edge.dst)?;
        }
        for output in &self.outputs {
            let mask = match &output.mask {
                Some(names) => ChannelMask::from_channel_names(names)
                    .ok_or_else(|| DescriptionError::InvalidMask(output.name.clone()))?,
                None => ChannelMask::default(),
            };
            graph.mark_output(&output.name, mask)?;
        }
        Ok(graph)
    }
}

/// A description file: any number of graphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    #[serde(default, rename = "graph")]
    pub graphs: Vec<GraphDescription>,
}

impl GraphFile {
    pub fn from_toml_str(text: &str) -> Result<Self, DescriptionError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, DescriptionError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, DescriptionError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), DescriptionError> {
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|source| DescriptionError::Io {
            path: path.to_owned(),
            source,
        })
    }

    /// Find a graph by constructor function name.
    pub fn find(&self, function: &str) -> Option<&GraphDescription> {
        self.graphs.iter().find(|g| g.function_name() == function)
    }
}

/// Default constructor function name of a graph.
///
/// Spaces and path separators are replaced by `_`.
pub fn default_function_name(graph_name: &str) -> String {
    let sanitized: String = graph_name
        .chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("render_graph_{sanitized}")
}

/// Builder recording graph-editing operations into a [`GraphDescription`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderGraphIr {
    description: GraphDescription,
}

impl RenderGraphIr {
    /// Start an empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            description: GraphDescription {
                name: name.into(),
                ..GraphDescription::default()
            },
        }
    }

    pub fn create_pass(&mut self, name: &str, type_name: &str, properties: Properties) -> &mut Self {
        self.description.passes.push(PassDescription {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            properties,
        });
        self
    }

    pub fn update_pass(&mut self, name: &str, properties: Properties) -> &mut Self {
        if let Some(pass) = self.description.passes.iter_mut().find(|p| p.name == name) {
            pass.properties = properties;
        }
        self
    }

    /// Remove a pass together with its edges and outputs.
    pub fn remove_pass(&mut self, name: &str) -> &mut Self {
        let touches = |endpoint: &str| endpoint == name || endpoint.split_once('.').map(|(p, _)| p) == Some(name);
        self.description.passes.retain(|p| p.name != name);
        self.description
            .edges
            .retain(|e| !touches(&e.src) && !touches(&e.dst));
        self.description.outputs.retain(|o| !touches(&o.name));
        self
    }

    pub fn add_edge(&mut self, src: &str, dst: &str) -> &mut Self {
        self.description.edges.push(EdgeDescription {
            src: src.to_owned(),
            dst: dst.to_owned(),
        });
        self
    }

    pub fn remove_edge(&mut self, src: &str, dst: &str) -> &mut Self {
        self.description.edges.retain(|e| e.src != src || e.dst != dst);
        self
    }

    /// Mark an output. RGB masks are recorded without an explicit mask.
    pub fn mark_output(&mut self, name: &str, mask: ChannelMask) -> &mut Self {
        let mask = (mask != ChannelMask::default())
            .then(|| mask.channel_names().into_iter().map(str::to_owned).collect());
        match self.description.outputs.iter_mut().find(|o| o.name == name) {
            Some(output) => output.mask = mask,
            None => self.description.outputs.push(OutputDescription {
                name: name.to_owned(),
                mask,
            }),
        }
        self
    }

    pub fn unmark_output(&mut self, name: &str) -> &mut Self {
        self.description.outputs.retain(|o| o.name != name);
        self
    }

    pub fn set_function(&mut self, function: &str) -> &mut Self {
        self.description.function = Some(function.to_owned());
        self
    }

    /// The recorded description.
    pub fn description(&self) -> &GraphDescription {
        &self.description
    }

    pub fn into_description(self) -> GraphDescription {
        self.description
    }

    /// Serialize the description as a single-graph file.
    pub fn to_toml_string(&self) -> Result<String, DescriptionError> {
        GraphFile {
            graphs: vec![self.description.clone()],
        }
        .to_toml_string()
    }
}

/// Builds render graphs from description files.
pub struct RenderGraphImporter;

impl RenderGraphImporter {
    /// Import one graph.
    ///
    /// An empty `path` means `<graph_name>.toml`; relative paths are looked up
    /// through the config's search paths. An empty `func_name` means
    /// [`default_function_name`] of `graph_name`.
    pub fn import(
        registry: &PassRegistry,
        config: &GraphConfig,
        graph_name: &str,
        path: &Path,
        func_name: &str,
    ) -> Option<RenderGraph> {
        let path = if path.as_os_str().is_empty() {
            PathBuf::from(format!("{graph_name}.toml"))
        } else {
            path.to_owned()
        };

        let file = match load_file(config, &path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("Can't import graph '{graph_name}': {e}");
                return None;
            }
        };

        let function = if func_name.is_empty() {
            default_function_name(graph_name)
        } else {
            func_name.to_owned()
        };
        Self::build(registry, config, &file, graph_name, &function, &path.display().to_string())
    }

    /// Import one graph from description text.
    pub fn import_from_str(
        registry: &PassRegistry,
        config: &GraphConfig,
        text: &str,
        graph_name: &str,
        func_name: &str,
    ) -> Option<RenderGraph> {
        let file = match GraphFile::from_toml_str(text) {
            Ok(file) => file,
            Err(e) => {
                log::error!("Can't import graph '{graph_name}': {e}");
                return None;
            }
        };
        let function = if func_name.is_empty() {
            default_function_name(graph_name)
        } else {
            func_name.to_owned()
        };
        Self::build(registry, config, &file, graph_name, &function, "<string>")
    }

    /// Import every graph of a description file. Graphs that fail to build
    /// are logged and skipped.
    pub fn import_all_graphs(registry: &PassRegistry, config: &GraphConfig, path: &Path) -> Vec<RenderGraph> {
        let file = match load_file(config, path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("Can't import graphs from {}: {e}", path.display());
                return Vec::new();
            }
        };

        let graphs: Vec<RenderGraph> = file
            .graphs
            .iter()
            .filter_map(|description| match description.build(registry, config) {
                Ok(graph) => Some(graph),
                Err(e) => {
                    log::error!(
                        "Can't build graph '{}' from {}: {e}",
                        description.name,
                        path.display()
                    );
                    None
                }
            })
            .collect();
        log::info!("Imported {} graphs from {}", graphs.len(), path.display());
        graphs
    }

    fn build(
        registry: &PassRegistry,
        config: &GraphConfig,
        file: &GraphFile,
        graph_name: &str,
        function: &str,
        source: &str,
    ) -> Option<RenderGraph> {
        let Some(description) = file.find(function) else {
            log::error!("Can't import graph '{graph_name}': {source} has no function '{function}'");
            return None;
        };

        match description.build(registry, config) {
            Ok(mut graph) => {
                if !graph_name.is_empty() {
                    graph.set_name(graph_name);
                }
                log::info!("Imported graph '{}' from {source}", graph.name());
                Some(graph)
            }
            Err(e) => {
                log::error!("Can't import graph '{graph_name}' from {source}: {e}");
                None
            }
        }
    }
}

fn load_file(config: &GraphConfig, path: &Path) -> Result<GraphFile, DescriptionError> {
    let resolved = config
        .resolve_path(path)
        .ok_or_else(|| DescriptionError::NotFound(path.to_owned()))?;
    GraphFile::load(&resolved)
}

/// Writes render graphs as description files.
pub struct RenderGraphExporter;

impl RenderGraphExporter {
    /// Record the current topology of `graph`: passes in insertion order with
    /// their properties, explicit edges and marked outputs.
    pub fn get_ir(graph: &RenderGraph) -> RenderGraphIr {
        let mut ir = RenderGraphIr::new(graph.name());
        for (_, name, pass) in graph.passes() {
            ir.create_pass(name, pass.type_name(), pass.properties());
        }
        for edge in graph.edges() {
            ir.add_edge(&edge.src(), &edge.dst());
        }
        for output in graph.outputs() {
            ir.mark_output(&output.name(), output.mask());
        }
        ir
    }

    /// Constructor function name used for an exported graph.
    pub fn get_func_name(graph_name: &str) -> String {
        default_function_name(graph_name)
    }

    /// Serialize `graph` to description text.
    pub fn to_toml_string(graph: &RenderGraph) -> Option<String> {
        match Self::get_ir(graph).to_toml_string() {
            Ok(text) => Some(text),
            Err(e) => {
                log::error!("Can't export graph '{}': {e}", graph.name());
                None
            }
        }
    }

    /// Save `graph` to `path`, or to `<name>.toml` when `path` is empty.
    pub fn save(graph: &RenderGraph, path: &Path) -> bool {
        let path = if path.as_os_str().is_empty() {
            PathBuf::from(format!("{}.toml", graph.name()))
        } else {
            path.to_owned()
        };

        let file = GraphFile {
            graphs: vec![Self::get_ir(graph).into_description()],
        };
        match file.save(&path) {
            Ok(()) => {
                log::info!("Saved graph '{}' to {}", graph.name(), path.display());
                true
            }
            Err(e) => {
                log::error!("Can't save graph '{}': {e}", graph.name());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GRAPHS: &str = r#"
[[graph]]
name = "forward"

[[graph.pass]]
name = "gbuffer"
type = "GBuffer"

[[graph.pass]]
name = "tonemap"
type = "ToneMapper"
properties = { exposure = 1.5, mode = "aces" }

[[graph.edge]]
src = "gbuffer.color"
dst = "tonemap.src"

[[graph.output]]
name = "tonemap.dst"
mask = ["red", "green", "blue", "alpha"]

[[graph]]
name = "debug view"
function = "debug_graph"
"#;

    #[test]
    fn test_parse_description() {
        let file = GraphFile::from_toml_str(TWO_GRAPHS).unwrap();
        assert_eq!(file.graphs.len(), 2);

        let forward = file.find("render_graph_forward").unwrap();
        assert_eq!(forward.passes.len(), 2);
        assert_eq!(forward.passes[1].type_name, "ToneMapper");
        assert_eq!(forward.passes[1].properties.get_f32("exposure", 0.0).unwrap(), 1.5);
        assert_eq!(forward.edges[0].src, "gbuffer.color");
        assert_eq!(forward.outputs[0].mask.as_ref().map(Vec::len), Some(4));

        assert!(file.find("debug_graph").is_some());
        assert!(file.find("render_graph_debug_view").is_none());
    }

    #[test]
    fn test_default_function_name() {
        assert_eq!(default_function_name("forward"), "render_graph_forward");
        assert_eq!(default_function_name("my graph/v2"), "render_graph_my_graph_v2");
    }

    #[test]
    fn test_ir_operations() {
        let mut ir = RenderGraphIr::new("test");
        ir.create_pass("a", "Source", Properties::new())
            .create_pass("b", "Sink", Properties::new())
            .add_edge("a.out", "b.in")
            .add_edge("a", "b")
            .mark_output("b.out", ChannelMask::RGB)
            .mark_output("a.out", ChannelMask::RED)
            .update_pass("b", Properties::new().with("scale", 2i64));

        let desc = ir.description();
        assert_eq!(desc.passes[1].properties.get_u32("scale", 0).unwrap(), 2);
        assert_eq!(desc.outputs[0].mask, None);
        assert_eq!(desc.outputs[1].mask, Some(vec!["red".to_owned()]));

        ir.remove_edge("a", "b");
        assert_eq!(ir.description().edges.len(), 1);

        ir.remove_pass("a");
        let desc = ir.description();
        assert_eq!(desc.passes.len(), 1);
        assert!(desc.edges.is_empty());
        assert_eq!(desc.outputs.len(), 1);

        ir.unmark_output("b.out");
        assert!(ir.description().outputs.is_empty());
    }

    #[test]
    fn test_ir_toml_roundtrip() {
        let mut ir = RenderGraphIr::new("roundtrip");
        ir.create_pass("a", "Source", Properties::new().with("enabled", true))
            .add_edge("a.out", "b.in")
            .mark_output("a.out", ChannelMask::RGBA);

        let text = ir.to_toml_string().unwrap();
        let file = GraphFile::from_toml_str(&text).unwrap();
        assert_eq!(file.graphs, vec![ir.into_description()]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_file(&GraphConfig::default(), Path::new("no/such/graph.toml")).unwrap_err();
        assert!(matches!(err, DescriptionError::NotFound(_)));
    }
}
