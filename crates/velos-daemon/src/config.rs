//! Daemon settings – `~/.velos/velosd.toml` plus `VELOS_*` overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Inputs come from a log replay rather than live hardware.
    #[serde(default)]
    pub replay: bool,

    /// Feed the bus from the built-in simulated vehicle.
    #[serde(default)]
    pub simulation: bool,

    /// Location of the parameter database.
    #[serde(default = "default_params_path")]
    pub params_path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            replay: false,
            simulation: false,
            params_path: default_params_path(),
        }
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

fn default_params_path() -> PathBuf {
    home_dir().join(".velos").join("params.db")
}

/// Path of the optional config file.
pub fn config_path() -> PathBuf {
    home_dir().join(".velos").join("velosd.toml")
}

impl DaemonConfig {
    /// Load the config file when present, apply environment overrides and
    /// make sure the parameter database's directory exists.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_from(&config_path())?.unwrap_or_default();
        cfg.apply_overrides(|name| std::env::var(name).ok());
        cfg.ensure_params_dir()?;
        Ok(cfg)
    }

    /// Returns `None` when `path` does not exist.
    pub(crate) fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(toml::from_str(&raw)?))
    }

    /// Apply `VELOS_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `VELOS_REPLAY` | `replay` |
    /// | `VELOS_SIMULATION` | `simulation` |
    /// | `VELOS_PARAMS_PATH` | `params_path` |
    ///
    /// Flags accept `1`/`true`; anything else reads as off.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VELOS_REPLAY") {
            self.replay = is_truthy(&v);
        }
        if let Some(v) = lookup("VELOS_SIMULATION") {
            self.simulation = is_truthy(&v);
        }
        if let Some(v) = lookup("VELOS_PARAMS_PATH")
            && !v.is_empty()
        {
            self.params_path = PathBuf::from(v);
        }
    }

    fn ensure_params_dir(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.params_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "True")
}
