// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration: data root, server URL, and scheduling intervals.
//!
//! Precedence, highest first: explicit caller overrides (CLI flags) →
//! environment (`WHIRR_DATA_DIR`, `WHIRR_SERVER_URL`) → `whirr.toml` in the
//! data root → built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LEASE_SECONDS: u64 = 60;
pub const DEFAULT_HEARTBEAT_SECONDS: u64 = 30;
pub const DEFAULT_POLL_SECONDS: u64 = 5;
pub const DEFAULT_GRACE_SECONDS: u64 = 10;
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

pub const ENV_DATA_DIR: &str = "WHIRR_DATA_DIR";
pub const ENV_SERVER_URL: &str = "WHIRR_SERVER_URL";

const CONFIG_FILE: &str = "whirr.toml";
const DEFAULT_DATA_ROOT: &str = ".whirr";

/// Resolved configuration used by workers, the server, and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_root: PathBuf,
    /// When set, submission and worker operations go through HTTP instead of
    /// the embedded store.
    pub server_url: Option<String>,
    pub lease: Duration,
    /// Bounded wait between lease renewals while a child runs.
    pub heartbeat: Duration,
    /// Sleep when the queue is empty.
    pub poll_interval: Duration,
    /// SIGTERM-to-SIGKILL window.
    pub grace: Duration,
    /// Listen address for `whirr serve`.
    pub bind: String,
}

/// On-disk shape of `whirr.toml`: everything optional, merged over defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server_url: Option<String>,
    lease_seconds: Option<u64>,
    heartbeat_seconds: Option<u64>,
    poll_seconds: Option<u64>,
    grace_seconds: Option<u64>,
    bind: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The data root does not exist; `whirr init` creates it.
    #[error("data root {0} not initialized (run `whirr init` first)")]
    NotInitialized(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Resolve configuration without requiring the data root to exist.
    pub fn load(data_root_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_root = data_root_override
            .or_else(|| std::env::var_os(ENV_DATA_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));

        let file = read_config_file(&data_root.join(CONFIG_FILE))?;

        let server_url = std::env::var(ENV_SERVER_URL)
            .ok()
            .filter(|s| !s.is_empty())
            .or(file.server_url);

        Ok(Self {
            data_root,
            server_url,
            lease: Duration::from_secs(file.lease_seconds.unwrap_or(DEFAULT_LEASE_SECONDS)),
            heartbeat: Duration::from_secs(
                file.heartbeat_seconds.unwrap_or(DEFAULT_HEARTBEAT_SECONDS),
            ),
            poll_interval: Duration::from_secs(file.poll_seconds.unwrap_or(DEFAULT_POLL_SECONDS)),
            grace: Duration::from_secs(file.grace_seconds.unwrap_or(DEFAULT_GRACE_SECONDS)),
            bind: file.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
        })
    }

    /// Resolve configuration and fail unless the data root exists.
    pub fn load_initialized(data_root_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::load(data_root_override)?;
        config.require_initialized()?;
        Ok(config)
    }

    /// Create the data root: `runs/` plus a commented `whirr.toml` skeleton.
    /// Idempotent.
    pub fn init(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.runs_root()).map_err(|source| ConfigError::Io {
            path: self.runs_root(),
            source,
        })?;
        let config_path = self.data_root.join(CONFIG_FILE);
        if !config_path.exists() {
            std::fs::write(&config_path, SKELETON).map_err(|source| ConfigError::Io {
                path: config_path,
                source,
            })?;
        }
        Ok(())
    }

    pub fn require_initialized(&self) -> Result<(), ConfigError> {
        if !self.data_root.is_dir() {
            return Err(ConfigError::NotInitialized(self.data_root.clone()));
        }
        Ok(())
    }

    pub fn runs_root(&self) -> PathBuf {
        self.data_root.join("runs")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_root.join("whirr.db")
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

const SKELETON: &str = "\
# whirr configuration. All keys optional; environment variables win.
#
# server_url = \"http://127.0.0.1:8787\"
# lease_seconds = 60
# heartbeat_seconds = 30
# poll_seconds = 5
# grace_seconds = 10
# bind = \"127.0.0.1:8787\"
";

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
