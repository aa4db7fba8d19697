// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up in the target root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "pkgwatch.toml";

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** validate. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load `<root>/pkgwatch.toml` if it exists, otherwise use defaults.
pub fn load_for_root(root: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = root.as_ref().join(CONFIG_FILE_NAME);
    if path.is_file() {
        debug!(?path, "loading config");
        load_and_validate(&path)
    } else {
        debug!(?path, "no config file; using defaults");
        Ok(ConfigFile::default())
    }
}
