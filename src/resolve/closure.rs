// src/resolve/closure.rs

//! External closure resolution.
//!
//! Computes, for one package and one build mode, every module name the
//! build engine must leave as a runtime import:
//!
//! - the package's peer dependencies (the consumer supplies them),
//! - its regular dependencies, unless the build inlines them,
//! - peer dependencies of everything reached, transitively,
//! - the runtime's built-in modules, unless the build targets a browser.
//!
//! The traversal is an explicit worklist; a visited set guarantees every
//! name is expanded at most once, so cyclic graphs terminate.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::{PkgwatchError, Result};
use crate::package::Package;
use crate::types::BundleMode;

use super::builtins::BUILTIN_MODULES;
use super::manifest::ManifestReader;

/// Unique module names, kept in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalNameSet {
    names: Vec<String>,
    index: HashSet<String>,
}

impl ExternalNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name`; returns false if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.index.contains(&name) {
            return false;
        }
        self.index.insert(name.clone());
        self.names.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl<S: Into<String>> FromIterator<S> for ExternalNameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ExternalNameSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Why a name sits on the worklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Stays a runtime import; only its peer dependencies matter.
    External,
    /// Inlined into a unified bundle; its dependencies are inlined too.
    Inlined,
}

/// Computes [`ExternalNameSet`]s.
#[derive(Debug, Clone)]
pub struct ExternalClosureResolver {
    reader: Arc<dyn ManifestReader>,
    allow_unresolvable: BTreeSet<String>,
}

impl ExternalClosureResolver {
    pub fn new(reader: Arc<dyn ManifestReader>, allow_unresolvable: BTreeSet<String>) -> Self {
        Self {
            reader,
            allow_unresolvable,
        }
    }

    /// Compute the external names for `pkg` built in `mode`.
    ///
    /// Fails with [`PkgwatchError::UnresolvableDependency`] when a reached
    /// module has no manifest and is not allow-listed.
    pub fn resolve(&self, pkg: &Package, mode: BundleMode) -> Result<ExternalNameSet> {
        let mut closure = Closure {
            own_name: &pkg.name,
            external: ExternalNameSet::new(),
            visited: HashSet::new(),
            frontier: VecDeque::new(),
        };

        for peer in pkg.peer_dependencies.keys() {
            closure.add_external(peer);
        }
        for dep in pkg.dependencies.keys() {
            if mode.unified_bundle {
                closure.frontier.push_back((dep.clone(), Reach::Inlined));
            } else {
                closure.add_external(dep);
            }
        }

        while let Some((name, reach)) = closure.frontier.pop_front() {
            if name == pkg.name || !closure.visited.insert(name.clone()) {
                continue;
            }

            let Some(manifest) = self.reader.read_manifest(&pkg.directory, &name)? else {
                if self.allow_unresolvable.contains(&name) {
                    debug!(package = %pkg.name, module = %name, "manifest not found; allow-listed, skipping");
                    continue;
                }
                return Err(PkgwatchError::UnresolvableDependency {
                    package: pkg.name.clone(),
                    name,
                });
            };

            trace!(package = %pkg.name, module = %name, ?reach, "expanding");
            for peer in manifest.peer_dependency_names() {
                closure.add_external(peer);
            }
            if mode.unified_bundle {
                for dep in manifest.dependency_names() {
                    closure.frontier.push_back((dep.to_string(), Reach::Inlined));
                }
            }
        }

        if !mode.browser_runtime {
            for builtin in BUILTIN_MODULES {
                closure.insert_external(builtin);
            }
        }

        debug!(
            package = %pkg.name,
            externals = closure.external.len(),
            visited = closure.visited.len(),
            "resolved external modules"
        );
        Ok(closure.external)
    }
}

/// State of one closure computation; never shared.
struct Closure<'a> {
    own_name: &'a str,
    external: ExternalNameSet,
    visited: HashSet<String>,
    frontier: VecDeque<(String, Reach)>,
}

impl Closure<'_> {
    /// Record `name` as external and queue it for peer expansion.
    fn add_external(&mut self, name: &str) {
        if name == self.own_name {
            return;
        }
        self.insert_external(name);
        if !self.visited.contains(name) {
            self.frontier.push_back((name.to_string(), Reach::External));
        }
    }

    fn insert_external(&mut self, name: &str) {
        if name != self.own_name {
            self.external.insert(name);
        }
    }
}
