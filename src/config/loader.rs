// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{RawRunConfig, RunConfig};
use crate::errors::Result;

/// Load a run configuration file and return the raw [`RawRunConfig`].
///
/// This only performs TOML deserialization; use [`load_and_validate`] to also
/// check the values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), "loaded run config");

    let config: RawRunConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a run configuration file and validate it.
///
/// This is the entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunConfig> {
    let raw_config = load_from_path(&path)?;
    let config = RunConfig::try_from(raw_config)?;
    Ok(config)
}

/// Same as [`load_and_validate`] for TOML already in memory.
pub fn parse_and_validate(contents: &str) -> Result<RunConfig> {
    let raw_config: RawRunConfig = toml::from_str(contents)?;
    RunConfig::try_from(raw_config)
}
