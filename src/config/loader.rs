// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "BGWORKER_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve and load the effective configuration.
///
/// - An explicit path (from `--config`) must exist.
/// - Otherwise `BGWORKER_CONFIG` is consulted.
/// - With neither, built-in defaults are used; no file is required.
pub fn load_effective(explicit: Option<&Path>) -> Result<ConfigFile> {
    match resolve_config_path(explicit) {
        Some(path) => {
            debug!(path = ?path, "loading config file");
            load_and_validate(&path)
        }
        None => {
            debug!("no config file given; using built-in defaults");
            ConfigFile::try_from(RawConfigFile::default())
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
