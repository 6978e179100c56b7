//! Engine configuration loaded from TOML files or built in code.
//!
//! Only two concerns are configurable: where the sled database lives and how
//! the fuzzy document search scores and caps its results. Everything else is
//! behavior defined by the active schemas themselves.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Location of the embedded database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Fuzzy search tuning. Scores are 0-100 partial-ratio similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum similarity score a document must reach to be returned.
    #[serde(default = "default_search_threshold")]
    pub threshold: f64,
    /// Maximum number of ranked matches returned per search.
    #[serde(default = "default_search_top_n")]
    pub top_n: usize,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/foliodb")
}

fn default_search_threshold() -> f64 {
    70.0
}

fn default_search_top_n() -> usize {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_search_threshold(),
            top_n: default_search_top_n(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            EngineError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Builds a configuration rooted at the given storage path, with default
    /// search settings.
    pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig { path: path.into() },
            search: SearchConfig::default(),
        }
    }
}
