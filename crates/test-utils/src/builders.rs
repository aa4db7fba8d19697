#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pkgwatch::errors::Result;
use pkgwatch::package::Package;
use pkgwatch::resolve::{DependencyManifest, ManifestReader};
use pkgwatch::types::BuildTarget;

/// Builder for `Package` to simplify test setup.
pub struct PackageBuilder {
    pkg: Package,
}

impl PackageBuilder {
    /// A package at `/ws/<name>` building the `cjs` target.
    pub fn new(name: &str) -> Self {
        let dir = format!("/ws/{}", name.replace('@', "").replace('/', "-"));
        Self {
            pkg: Package {
                name: name.to_string(),
                directory: PathBuf::from(dir),
                entrypoints: vec![PathBuf::from("src/index.js")],
                dependencies: BTreeMap::new(),
                peer_dependencies: BTreeMap::new(),
                targets: vec![BuildTarget::Cjs],
            },
        }
    }

    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pkg.directory = dir.into();
        self
    }

    pub fn dep(mut self, name: &str) -> Self {
        self.pkg.dependencies.insert(name.to_string(), "*".to_string());
        self
    }

    pub fn peer(mut self, name: &str) -> Self {
        self.pkg
            .peer_dependencies
            .insert(name.to_string(), "*".to_string());
        self
    }

    pub fn targets(mut self, targets: &[BuildTarget]) -> Self {
        self.pkg.targets = targets.to_vec();
        self
    }

    pub fn build(self) -> Package {
        self.pkg
    }
}

/// Manifest reader over an in-memory dependency graph.
///
/// Records every lookup so tests can assert on traversal.
#[derive(Debug, Default)]
pub struct InMemoryManifests {
    manifests: HashMap<String, Arc<DependencyManifest>>,
    lookups: Mutex<Vec<String>>,
}

impl InMemoryManifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installed module with its dependencies and peers.
    pub fn with(mut self, name: &str, deps: &[&str], peers: &[&str]) -> Self {
        let map = |names: &[&str]| -> BTreeMap<String, String> {
            names
                .iter()
                .map(|n| (n.to_string(), "*".to_string()))
                .collect()
        };
        self.manifests.insert(
            name.to_string(),
            Arc::new(DependencyManifest {
                dependencies: map(deps),
                peer_dependencies: map(peers),
            }),
        );
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    /// How many times `name` was looked up.
    pub fn lookup_count(&self, name: &str) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }
}

impl ManifestReader for InMemoryManifests {
    fn read_manifest(&self, _from: &Path, name: &str) -> Result<Option<Arc<DependencyManifest>>> {
        self.lookups.lock().unwrap().push(name.to_string());
        Ok(self.manifests.get(name).cloned())
    }
}
