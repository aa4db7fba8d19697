// src/config/model.rs

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::types::BuildTarget;

/// Configuration exactly as deserialized from `pkgwatch.toml`.
///
/// ```toml
/// [resolve]
/// allow_unresolvable = ["nopt"]
///
/// [build]
/// out_dir = "dist"
/// clean_out_dir = true
/// default_targets = ["cjs"]
///
/// [engine]
/// command = "pkgwatch-engine"
/// args = ["--watch"]
/// ```
///
/// All sections are optional. Turn it into a [`ConfigFile`] with
/// `ConfigFile::try_from`, which validates it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub resolve: ResolveSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub engine: EngineSection,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub resolve: ResolveSection,
    pub build: BuildSection,
    pub engine: EngineSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        resolve: ResolveSection,
        build: BuildSection,
        engine: EngineSection,
    ) -> Self {
        Self {
            resolve,
            build,
            engine,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ResolveSection::default(),
            BuildSection::default(),
            EngineSection::default(),
        )
    }
}

/// `[resolve]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveSection {
    /// Module names whose manifest may be missing without aborting
    /// external resolution.
    #[serde(default)]
    pub allow_unresolvable: BTreeSet<String>,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Output directory, relative to each package directory.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Remove `out_dir` before every session start.
    #[serde(default = "default_clean_out_dir")]
    pub clean_out_dir: bool,

    /// Targets for packages whose `package.json` declares no entry fields.
    #[serde(default = "default_targets")]
    pub default_targets: Vec<BuildTarget>,
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_clean_out_dir() -> bool {
    true
}

fn default_targets() -> Vec<BuildTarget> {
    vec![BuildTarget::Cjs]
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            clean_out_dir: default_clean_out_dir(),
            default_targets: default_targets(),
        }
    }
}

/// `[engine]` section: the external build engine executable.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_engine_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

fn default_engine_command() -> String {
    "pkgwatch-engine".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
        }
    }
}
