// src/package/mod.rs

//! Package data model.
//!
//! A [`Package`] is loaded once from its `package.json` and is immutable
//! afterwards; the coordinator shares it with sessions behind an `Arc`.
//!
//! - [`discover`] decides whether a directory is a single package or a
//!   multi-package workspace.
//! - [`aliases`] builds the name → source map that lets workspace packages
//!   import each other without a registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{PkgwatchError, Result};
use crate::types::BuildTarget;

pub mod aliases;
pub mod discover;

pub use aliases::Aliases;
pub use discover::{discover, Discovered};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Entry source used when `package.json` has no `source` field.
pub const DEFAULT_ENTRYPOINT: &str = "src/index.js";

/// The subset of `package.json` pkgwatch reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    /// Either a path or a replacement map; only its presence matters here.
    #[serde(default)]
    pub browser: Option<serde_json::Value>,
    #[serde(default, rename = "umd:main")]
    pub umd_main: Option<String>,
    #[serde(default)]
    pub source: Option<OneOrMany>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub workspaces: Option<Workspaces>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// `workspaces` is either a glob list or `{ "packages": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Patterns(Vec<String>),
    Config {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::Patterns(p) => p,
            Workspaces::Config { packages } => packages,
        }
    }
}

impl PackageJson {
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| {
            PkgwatchError::ManifestError(format!("invalid {}: {}", path.display(), e))
        })
    }

    /// Targets requested by the entry fields, in a fixed order.
    pub fn declared_targets(&self) -> Vec<BuildTarget> {
        let mut targets = Vec::new();
        if self.main.is_some() {
            targets.push(BuildTarget::Cjs);
        }
        if self.module.is_some() {
            targets.push(BuildTarget::Esm);
        }
        if self.browser.is_some() {
            targets.push(BuildTarget::Browser);
        }
        if self.umd_main.is_some() {
            targets.push(BuildTarget::Umd);
        }
        targets
    }
}

/// A buildable package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    /// Root directory of the package (where its `package.json` lives).
    pub directory: PathBuf,
    /// Entry sources, relative to `directory`.
    pub entrypoints: Vec<PathBuf>,
    /// name → version spec
    pub dependencies: BTreeMap<String, String>,
    /// name → version spec
    pub peer_dependencies: BTreeMap<String, String>,
    pub targets: Vec<BuildTarget>,
}

impl Package {
    /// Build a package from its parsed manifest.
    ///
    /// `default_targets` is used when the manifest declares no entry fields.
    pub fn from_manifest(
        directory: impl Into<PathBuf>,
        manifest: PackageJson,
        default_targets: &[BuildTarget],
    ) -> Result<Self> {
        let directory = directory.into();
        let name = match manifest.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(PkgwatchError::ManifestError(format!(
                    "{} has no \"name\" field",
                    directory.join(MANIFEST_FILE).display()
                )));
            }
        };

        let mut targets = manifest.declared_targets();
        if targets.is_empty() {
            targets = default_targets.to_vec();
        }

        let entrypoints = match &manifest.source {
            Some(OneOrMany::One(s)) => vec![PathBuf::from(s)],
            Some(OneOrMany::Many(list)) if !list.is_empty() => {
                list.iter().map(PathBuf::from).collect()
            }
            _ => vec![PathBuf::from(DEFAULT_ENTRYPOINT)],
        };

        Ok(Self {
            name,
            directory,
            entrypoints,
            dependencies: manifest.dependencies,
            peer_dependencies: manifest.peer_dependencies,
            targets,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE)
    }

    /// File-name stem for outputs: `@scope/pkg` becomes `scope-pkg`.
    pub fn file_base(&self) -> String {
        self.name.replace('@', "").replace('/', "-")
    }

    /// Primary entry source as an absolute path.
    pub fn main_entry(&self) -> PathBuf {
        match self.entrypoints.first() {
            Some(entry) => self.directory.join(entry),
            None => self.directory.join(DEFAULT_ENTRYPOINT),
        }
    }
}
