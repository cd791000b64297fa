//! Configuration loaded from `.cgt/config.toml`.
//!
//! Every field has a default, so a partial (or missing) file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{CgtError, Result};
use crate::graph::paths::Uniqueness;
use crate::link::LinkOptions;
use crate::query::QueryOptions;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".cgt/config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CgtConfig {
    pub link: LinkConfig,
    pub query: QueryConfig,
    pub cache: CacheConfig,
}

/// `[link]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Drop declarations that have no incident edge when compacting.
    pub drop_unused_declarations: bool,
    /// Emit a diagnostic when two files define the same non-static name.
    pub report_duplicate_definitions: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drop_unused_declarations: true,
            report_duplicate_definitions: true,
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound on path extensions per finder run. 0 means unlimited.
    pub max_path_steps: usize,
    /// Run one finder per (source, destination) pair on the rayon pool.
    pub parallel: bool,
    pub uniqueness: Uniqueness,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_path_steps: 1_000_000,
            parallel: true,
            uniqueness: Uniqueness::Edge,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot file, relative to the config directory unless absolute.
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("graph.bin"),
        }
    }
}

impl CgtConfig {
    /// Load the config at `path`, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "ignoring config file");
                Self::default()
            }
        }
    }

    /// Strict variant of [`CgtConfig::load`].
    pub fn try_load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CgtError::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CgtError::Config(e.to_string()))
    }

    /// Where the graph snapshot lives, given the directory holding the config.
    pub fn resolve_cache_path(&self, config_dir: &Path) -> PathBuf {
        if self.cache.path.is_absolute() {
            self.cache.path.clone()
        } else {
            config_dir.join(&self.cache.path)
        }
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            report_duplicate_definitions: self.link.report_duplicate_definitions,
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            max_path_steps: match self.query.max_path_steps {
                0 => None,
                steps => Some(steps),
            },
            parallel: self.query.parallel,
            uniqueness: self.query.uniqueness,
        }
    }
}
