// src/config/mod.rs

//! Configuration loading and validation for pkgwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_for_root, load_from_path, CONFIG_FILE_NAME};
pub use model::{BuildSection, ConfigFile, EngineSection, RawConfigFile, ResolveSection};
