//! Render graph configuration loaded from TOML.
//!
//! ```toml
//! default_width = 1280
//! default_height = 720
//! default_format = "Rgba16Float"
//! transient_aliasing = true
//! search_paths = ["graphs", "../shared/graphs"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Extent2d, ResourceFormat};

/// Errors loading a [`GraphConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Defaults shared by every graph created from this configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Width of default-sized resources until the first resize.
    pub default_width: u32,
    /// Height of default-sized resources until the first resize.
    pub default_height: u32,
    /// Format of resources whose format nobody specifies.
    pub default_format: ResourceFormat,
    /// Let transient resources with disjoint lifetimes share memory.
    pub transient_aliasing: bool,
    /// Directories searched for relative graph description paths.
    pub search_paths: Vec<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_width: 1920,
            default_height: 1080,
            default_format: ResourceFormat::Rgba32Float,
            transient_aliasing: true,
            search_paths: Vec::new(),
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration file, falling back to defaults if it is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded graph config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("No graph config ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Default size as an extent.
    pub fn default_dims(&self) -> Extent2d {
        Extent2d::new(self.default_width, self.default_height)
    }

    /// Resolve a graph description path.
    ///
    /// Absolute or existing paths are returned as-is; otherwise each search
    /// path is tried in order.
    pub fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() || path.exists() {
            return path.exists().then(|| path.to_owned());
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
    }
}
