//! Runtime configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sg_core::types::PLACEHOLDER_DOMAIN;

use crate::error::ConfigError;

pub const DEFAULT_STATISTICS_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Directory holding persisted storage areas. In-memory when absent.
    pub state_dir: Option<PathBuf>,
    /// Quiet period before counter increments are written out
    pub statistics_debounce_ms: u64,
    /// Domain assumed for tabs without a parseable URL
    pub placeholder_domain: String,
    /// JSON object of administrator-managed settings
    pub managed_settings: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            statistics_debounce_ms: DEFAULT_STATISTICS_DEBOUNCE_MS,
            placeholder_domain: PLACEHOLDER_DOMAIN.to_string(),
            managed_settings: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn statistics_debounce(&self) -> Duration {
        Duration::from_millis(self.statistics_debounce_ms)
    }

    /// Read the managed settings object, empty when none is configured.
    pub fn load_managed_settings(&self) -> Result<Map<String, Value>, ConfigError> {
        let Some(path) = &self.managed_settings else {
            return Ok(Map::new());
        };

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::ManagedNotObject(path.clone())),
        }
    }
}
