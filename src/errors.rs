// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgwatchError {
    /// A dependency's manifest could not be found and the name is not on the
    /// allow-list. The dependency tree is broken; the build must stop.
    #[error("could not resolve '{name}' while computing externals for '{package}'")]
    UnresolvableDependency { package: String, name: String },

    /// The build engine reported an unrecoverable failure for a package.
    #[error("build of '{package}' failed: {message}")]
    EngineFatal { package: String, message: String },

    /// Supporting files could not be written after a successful build.
    #[error("writing auxiliary files for '{package}' failed: {source}")]
    AuxiliaryWrite {
        package: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid external pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("invalid workspace glob: {0}")]
    GlobError(#[from] globset::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PkgwatchError {
    /// Name of the package this error is attributed to, if any.
    pub fn package(&self) -> Option<&str> {
        match self {
            PkgwatchError::UnresolvableDependency { package, .. }
            | PkgwatchError::EngineFatal { package, .. }
            | PkgwatchError::AuxiliaryWrite { package, .. } => Some(package),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PkgwatchError>;
