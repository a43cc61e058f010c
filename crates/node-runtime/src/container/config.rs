//! # Node Configuration
//!
//! Defaults, overridden by an optional JSON file, then by environment
//! variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DID_NODE_CONFIG` | path of the JSON file |
//! | `DID_LEDGER` | `ledger` |
//! | `DID_START_HEIGHT` | `sync.start_height` |
//! | `DID_FORCE_RESCAN` | `sync.force_full_rescan` |
//! | `DID_POLL_INTERVAL_SECS` | `sync.poll_interval_secs` |
//! | `DID_CHAIN_FILE` | `chain_file` |

use did_01_operation_parser::ProtocolParameters;
use did_02_chain_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use shared_types::LedgerId;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CONFIG_FILE: &str = "DID_NODE_CONFIG";
pub const ENV_LEDGER: &str = "DID_LEDGER";
pub const ENV_START_HEIGHT: &str = "DID_START_HEIGHT";
pub const ENV_FORCE_RESCAN: &str = "DID_FORCE_RESCAN";
pub const ENV_POLL_INTERVAL: &str = "DID_POLL_INTERVAL_SECS";
pub const ENV_CHAIN_FILE: &str = "DID_CHAIN_FILE";

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Ledger this node follows.
    pub ledger: LedgerId,
    /// Upstream chain dump read by the JSON block source.
    pub chain_file: PathBuf,
    pub sync: SyncConfig,
    pub protocol: ProtocolParameters,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerId::Preprod,
            chain_file: PathBuf::from("./chain.json"),
            sync: SyncConfig::default(),
            protocol: ProtocolParameters::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(|var| std::env::var(var).ok())
    }

    /// Load using `env` to look up variables.
    pub fn from_sources<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match env(ENV_CONFIG_FILE) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env(ENV_LEDGER) {
            self.ledger = parse_var(ENV_LEDGER, value)?;
        }
        if let Some(value) = env(ENV_START_HEIGHT) {
            self.sync.start_height = parse_var(ENV_START_HEIGHT, value)?;
        }
        if let Some(value) = env(ENV_FORCE_RESCAN) {
            self.sync.force_full_rescan = parse_flag(ENV_FORCE_RESCAN, value)?;
        }
        if let Some(value) = env(ENV_POLL_INTERVAL) {
            self.sync.poll_interval_secs = parse_var(ENV_POLL_INTERVAL, value)?;
        }
        if let Some(value) = env(ENV_CHAIN_FILE) {
            self.chain_file = PathBuf::from(value);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}
