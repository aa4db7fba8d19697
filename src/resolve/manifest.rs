// src/resolve/manifest.rs

//! Dependency manifest lookup (the dependency graph reader).

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::errors::{PkgwatchError, Result};
use crate::fs::FileSystem;
use crate::package::MANIFEST_FILE;

/// Dependency lists of an installed module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl DependencyManifest {
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn peer_dependency_names(&self) -> impl Iterator<Item = &str> {
        self.peer_dependencies.keys().map(String::as_str)
    }
}

/// Looks up the manifest of an installed module by name.
pub trait ManifestReader: Send + Sync + Debug {
    /// Return the manifest of `name` as seen from the package directory
    /// `from`.
    ///
    /// - `Ok(None)`: the module is not installed ("not found").
    /// - `Err(_)`: the manifest exists but could not be read or parsed.
    fn read_manifest(&self, from: &Path, name: &str) -> Result<Option<Arc<DependencyManifest>>>;

    /// Forget memoised lookups so the next read sees the disk as it is now.
    fn invalidate(&self) {}
}

/// Memoised manifest lookups, keyed by manifest path.
///
/// `None` records a confirmed miss. Owned by one reader for one coordinator
/// run and cleared whenever a package is re-planned.
#[derive(Debug, Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<PathBuf, Option<Arc<DependencyManifest>>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, path: &Path) -> Option<Option<Arc<DependencyManifest>>> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.get(path).cloned()
    }

    fn insert(&self, path: PathBuf, manifest: Option<Arc<DependencyManifest>>) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(path, manifest);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

/// Reads `node_modules/<name>/package.json`, searching from the requesting
/// package directory upwards through its ancestors.
#[derive(Debug)]
pub struct NodeModulesReader {
    fs: Arc<dyn FileSystem>,
    cache: ManifestCache,
}

impl NodeModulesReader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: ManifestCache::new(),
        }
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    fn load(&self, path: &Path) -> Result<Option<Arc<DependencyManifest>>> {
        if let Some(cached) = self.cache.get(path) {
            trace!(?path, "manifest cache hit");
            return Ok(cached);
        }

        let manifest = if self.fs.is_file(path) {
            let contents = self.fs.read_to_string(path).map_err(PkgwatchError::Other)?;
            let parsed: DependencyManifest = serde_json::from_str(&contents).map_err(|e| {
                PkgwatchError::ManifestError(format!("invalid {}: {}", path.display(), e))
            })?;
            Some(Arc::new(parsed))
        } else {
            None
        };

        self.cache.insert(path.to_path_buf(), manifest.clone());
        Ok(manifest)
    }
}

impl ManifestReader for NodeModulesReader {
    fn read_manifest(&self, from: &Path, name: &str) -> Result<Option<Arc<DependencyManifest>>> {
        for dir in from.ancestors() {
            let candidate = dir.join("node_modules").join(name).join(MANIFEST_FILE);
            if let Some(manifest) = self.load(&candidate)? {
                debug!(module = name, path = ?candidate, "resolved manifest");
                return Ok(Some(manifest));
            }
        }
        Ok(None)
    }

    fn invalidate(&self) {
        trace!(entries = self.cache.len(), "clearing manifest cache");
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn nearest_node_modules_wins() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/ws/packages/a/node_modules/react-dom/package.json",
            r#"{ "name": "react-dom", "peerDependencies": { "react": "^18" } }"#,
        );
        fs.add_file(
            "/ws/node_modules/react-dom/package.json",
            r#"{ "name": "react-dom", "peerDependencies": { "react": "^17", "scheduler": "*" } }"#,
        );
        let reader = NodeModulesReader::new(Arc::new(fs));

        let manifest = reader
            .read_manifest(Path::new("/ws/packages/a"), "react-dom")
            .unwrap()
            .expect("found");
        assert_eq!(manifest.peer_dependency_names().collect::<Vec<_>>(), vec!["react"]);

        let hoisted = reader
            .read_manifest(Path::new("/ws/packages/b"), "react-dom")
            .unwrap()
            .expect("found");
        assert_eq!(hoisted.peer_dependencies.len(), 2);
    }

    #[test]
    fn scoped_names_resolve() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/p/node_modules/@babel/runtime/package.json",
            r#"{ "name": "@babel/runtime", "dependencies": { "regenerator-runtime": "*" } }"#,
        );
        let reader = NodeModulesReader::new(Arc::new(fs));

        let manifest = reader
            .read_manifest(Path::new("/p"), "@babel/runtime")
            .unwrap()
            .expect("found");
        assert_eq!(
            manifest.dependency_names().collect::<Vec<_>>(),
            vec!["regenerator-runtime"]
        );
    }

    #[test]
    fn missing_module_is_not_found_and_cached() {
        let fs = MockFileSystem::new();
        let reader = NodeModulesReader::new(Arc::new(fs));

        assert!(reader.read_manifest(Path::new("/p"), "ghost").unwrap().is_none());
        let misses = reader.cache().len();
        assert!(misses > 0);

        assert!(reader.read_manifest(Path::new("/p"), "ghost").unwrap().is_none());
        assert_eq!(reader.cache().len(), misses);
    }

    #[test]
    fn invalidate_rereads_installed_modules() {
        let fs = MockFileSystem::new();
        let reader = NodeModulesReader::new(Arc::new(fs.clone()));
        assert!(reader.read_manifest(Path::new("/p"), "react").unwrap().is_none());

        fs.add_file("/p/node_modules/react/package.json", r#"{ "name": "react" }"#);
        assert!(
            reader.read_manifest(Path::new("/p"), "react").unwrap().is_none(),
            "cached miss"
        );

        reader.invalidate();
        assert!(reader.cache().is_empty());
        assert!(reader.read_manifest(Path::new("/p"), "react").unwrap().is_some());
    }

    #[test]
    fn broken_manifest_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/node_modules/bad/package.json", "{ not json");
        let reader = NodeModulesReader::new(Arc::new(fs));

        let err = reader.read_manifest(Path::new("/p"), "bad").unwrap_err();
        assert!(matches!(err, PkgwatchError::ManifestError(_)));
    }
}
