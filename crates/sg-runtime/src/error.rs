//! Runtime error types

use std::path::PathBuf;

use sg_core::SettingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed stored data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage area \"{0}\" is read-only")]
    ReadOnly(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleEngineError {
    #[error("Rule update rejected: {0}")]
    Rejected(String),

    #[error("Unknown ruleset: {0}")]
    UnknownRuleset(String),
}

/// Failure of one scheduled rule update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Engine(#[from] RuleEngineError),

    #[error("Rule payload could not be serialized: {0}")]
    Payload(String),

    #[error("Rule update for \"{0}\" was dropped before completing")]
    Dropped(String),

    #[error("Rule update for \"{0}\" panicked")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Managed settings in '{0}' must be a JSON object")]
    ManagedNotObject(PathBuf),
}

/// Any error surfaced by the coordinator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Setting(#[from] SettingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
