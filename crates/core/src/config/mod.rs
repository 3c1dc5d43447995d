// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration
//!
//! Loaded once from TOML at process start and passed by reference to the
//! components that need it. Every field has a default, so an absent file or
//! section yields a working configuration.

use crate::coordination::LockConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides the configuration file location
pub const CONFIG_ENV: &str = "PJ_CONFIG";
/// Overrides the API/listener socket directory
pub const SOCKET_DIR_ENV: &str = "PJ_SOCKET_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lock: LockConfig,
    pub persistence: PersistenceConfig,
    pub output: OutputConfig,
    pub api: ApiConfig,
    pub plugins: PluginsConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    /// JSON-lines file holding finished instances
    pub path: PathBuf,
    /// Keep at most this many records; 0 keeps all
    pub max_records: usize,
    /// Drop records older than this
    #[serde(with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: state_dir().join("history.jsonl"),
            max_records: 0,
            max_age: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output lines kept per instance for snapshots and tailing
    pub tail_lines: usize,
    /// Error lines kept per instance
    pub error_lines: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tail_lines: 10,
            error_lines: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub socket_dir: PathBuf,
    /// Per-server request timeout used by clients
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Names of plugins to enable, looked up in the plugin registry
    pub enabled: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        if let Some(dir) = socket_dir_override() {
            config.api.socket_dir = dir;
        }
        Ok(config)
    }

    /// Load from `$PJ_CONFIG` or the user config directory, falling back to defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("phasejob").join("phasejob.toml")));
        match path {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

fn socket_dir_override() -> Option<PathBuf> {
    std::env::var_os(SOCKET_DIR_ENV).map(PathBuf::from)
}

/// Short path for sockets (SUN_LEN is small on some platforms), overridable for tests
fn default_socket_dir() -> PathBuf {
    socket_dir_override().unwrap_or_else(|| std::env::temp_dir().join("phasejob"))
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .unwrap_or_else(std::env::temp_dir)
        .join("phasejob")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
