// src/package/discover.rs

//! Manifest discovery: single package or multi-package workspace.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::errors::{PkgwatchError, Result};
use crate::fs::{relative_str, FileSystem};
use crate::types::BuildTarget;

use super::{Package, PackageJson, MANIFEST_FILE};

/// Directory depth searched for `**` workspace patterns.
const MAX_RECURSIVE_DEPTH: usize = 8;

/// What lives at the target root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    SinglePackage(Package),
    /// Workspace member packages, sorted by directory.
    Workspace(Vec<Package>),
}

impl Discovered {
    pub fn into_packages(self) -> Vec<Package> {
        match self {
            Discovered::SinglePackage(pkg) => vec![pkg],
            Discovered::Workspace(pkgs) => pkgs,
        }
    }
}

/// Read `<root>/package.json` and decide whether `root` is a workspace.
///
/// A root manifest with a `workspaces` field is a workspace; its glob
/// patterns are matched against directories under `root` that contain a
/// `package.json`. Patterns starting with `!` exclude directories.
pub fn discover(
    fs: &dyn FileSystem,
    root: &Path,
    default_targets: &[BuildTarget],
) -> Result<Discovered> {
    let root = fs.canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let manifest = read_package_json(fs, &root)?;

    let Some(workspaces) = manifest.workspaces.clone() else {
        let pkg = Package::from_manifest(&root, manifest, default_targets)?;
        info!(package = %pkg.name, "found single package");
        return Ok(Discovered::SinglePackage(pkg));
    };

    let packages = find_workspace_packages(fs, &root, workspaces.patterns(), default_targets)?;
    if packages.is_empty() {
        return Err(PkgwatchError::ConfigError(format!(
            "workspace at {} has no packages matching {:?}",
            root.display(),
            workspaces.patterns()
        )));
    }

    info!(count = packages.len(), "found workspace packages");
    Ok(Discovered::Workspace(packages))
}

fn read_package_json(fs: &dyn FileSystem, dir: &Path) -> Result<PackageJson> {
    let path = dir.join(MANIFEST_FILE);
    let contents = fs.read_to_string(&path).map_err(|e| {
        PkgwatchError::ManifestError(format!("could not read {}: {:#}", path.display(), e))
    })?;
    PackageJson::parse(&contents, &path)
}

struct WorkspacePatterns {
    include: GlobSet,
    exclude: GlobSet,
    max_depth: usize,
}

impl WorkspacePatterns {
    fn compile(patterns: &[String]) -> Result<Self> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut max_depth = 1;

        for raw in patterns {
            let (negated, pattern) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };
            let pattern = pattern.trim().trim_start_matches("./").trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }

            let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
            if negated {
                exclude.add(glob);
            } else {
                let depth = if pattern.contains("**") {
                    MAX_RECURSIVE_DEPTH
                } else {
                    pattern.split('/').count()
                };
                max_depth = max_depth.max(depth);
                include.add(glob);
            }
        }

        Ok(Self {
            include: include.build()?,
            exclude: exclude.build()?,
            max_depth,
        })
    }

    fn matches(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }
}

fn find_workspace_packages(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &[String],
    default_targets: &[BuildTarget],
) -> Result<Vec<Package>> {
    let patterns = WorkspacePatterns::compile(patterns)?;

    let mut packages = Vec::new();
    let mut names = HashSet::new();
    let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

    while let Some((dir, depth)) = stack.pop() {
        let entries = fs.read_dir(&dir).map_err(PkgwatchError::Other)?;
        for child in entries {
            if !fs.is_dir(&child) || is_skipped_dir(&child) {
                continue;
            }

            if let Some(rel) = relative_str(root, &child) {
                if patterns.matches(&rel) && fs.is_file(&child.join(MANIFEST_FILE)) {
                    let manifest = read_package_json(fs, &child)?;
                    let pkg = Package::from_manifest(&child, manifest, default_targets)?;
                    if !names.insert(pkg.name.clone()) {
                        return Err(PkgwatchError::ManifestError(format!(
                            "package name '{}' is used by more than one workspace package",
                            pkg.name
                        )));
                    }
                    debug!(package = %pkg.name, dir = %rel, "workspace package");
                    packages.push(pkg);
                }
            }

            if depth + 1 < patterns.max_depth {
                stack.push((child, depth + 1));
            }
        }
    }

    packages.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(packages)
}

fn is_skipped_dir(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name == "node_modules" || name.starts_with('.'),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    fn workspace_fs() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/ws/package.json",
            r#"{ "private": true, "workspaces": ["packages/*", "!packages/internal"] }"#,
        );
        fs.add_file("/ws/packages/b/package.json", r#"{ "name": "b", "main": "dist/b.cjs.js" }"#);
        fs.add_file("/ws/packages/a/package.json", r#"{ "name": "a", "module": "dist/a.esm.js" }"#);
        fs.add_file("/ws/packages/internal/package.json", r#"{ "name": "internal" }"#);
        fs.add_file("/ws/packages/a/node_modules/x/package.json", r#"{ "name": "x" }"#);
        fs.add_file("/ws/packages/notes/README.md", "no manifest here");
        fs
    }

    #[test]
    fn single_package_without_workspaces_field() {
        let fs = MockFileSystem::new();
        fs.add_file("/pkg/package.json", r#"{ "name": "solo" }"#);

        let found = discover(&fs, Path::new("/pkg"), &[BuildTarget::Cjs]).unwrap();
        match found {
            Discovered::SinglePackage(pkg) => {
                assert_eq!(pkg.name, "solo");
                assert_eq!(pkg.directory, PathBuf::from("/pkg"));
            }
            other => panic!("expected single package, got {:?}", other),
        }
    }

    #[test]
    fn workspace_globs_select_member_packages() {
        let fs = workspace_fs();

        let found = discover(&fs, Path::new("/ws"), &[BuildTarget::Cjs]).unwrap();
        let names: Vec<String> = found.into_packages().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn yarn_style_workspace_object_is_supported() {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/package.json", r#"{ "workspaces": { "packages": ["libs/*"] } }"#);
        fs.add_file("/ws/libs/core/package.json", r#"{ "name": "@ws/core" }"#);

        let found = discover(&fs, Path::new("/ws"), &[BuildTarget::Cjs]).unwrap();
        assert!(matches!(found, Discovered::Workspace(ref pkgs) if pkgs.len() == 1));
    }

    #[test]
    fn empty_workspace_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/package.json", r#"{ "workspaces": ["packages/*"] }"#);

        let err = discover(&fs, Path::new("/ws"), &[BuildTarget::Cjs]).unwrap_err();
        assert!(matches!(err, PkgwatchError::ConfigError(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/package.json", r#"{ "workspaces": ["packages/*"] }"#);
        fs.add_file("/ws/packages/a/package.json", r#"{ "name": "same" }"#);
        fs.add_file("/ws/packages/b/package.json", r#"{ "name": "same" }"#);

        let err = discover(&fs, Path::new("/ws"), &[BuildTarget::Cjs]).unwrap_err();
        assert!(matches!(err, PkgwatchError::ManifestError(msg) if msg.contains("same")));
    }

    #[test]
    fn missing_root_manifest_is_reported() {
        let fs = MockFileSystem::new();
        let err = discover(&fs, Path::new("/nowhere"), &[BuildTarget::Cjs]).unwrap_err();
        assert!(matches!(err, PkgwatchError::ManifestError(msg) if msg.contains("/nowhere/package.json")));
    }
}
