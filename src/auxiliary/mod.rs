// src/auxiliary/mod.rs

//! Supporting files written next to a finished bundle.
//!
//! Packages whose entry source is Flow-typed get a `.flow` declaration file
//! beside the CommonJS output so consumers keep the type information.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::engine::BundleMetadata;
use crate::fs::FileSystem;
use crate::package::Package;
use crate::types::AuxiliaryMode;

/// Pragma marking a Flow-typed source file.
pub const FLOW_PRAGMA: &str = "@flow";

impl AuxiliaryMode {
    /// Pick the mode for a finished bundle from the engine's report.
    pub fn for_bundle(metadata: &BundleMetadata) -> Self {
        if !metadata.entry_source.contains(FLOW_PRAGMA) {
            return AuxiliaryMode::None;
        }
        if metadata.exports.iter().any(|e| e == "default") {
            AuxiliaryMode::All
        } else {
            AuxiliaryMode::Named
        }
    }
}

/// Writes supporting declaration files for a package.
///
/// Errors are fatal for the package's session.
pub trait AuxiliaryWriter: Send + Sync {
    fn write(&self, package: &Package, mode: AuxiliaryMode) -> Result<()>;
}

/// Writes `<out_dir>/<base>.cjs.js.flow` through a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct FsAuxiliaryWriter {
    fs: Arc<dyn FileSystem>,
    out_dir: String,
}

impl FsAuxiliaryWriter {
    pub fn new(fs: Arc<dyn FileSystem>, out_dir: impl Into<String>) -> Self {
        Self {
            fs,
            out_dir: out_dir.into(),
        }
    }

    pub fn flow_file(&self, package: &Package) -> PathBuf {
        package
            .directory
            .join(&self.out_dir)
            .join(format!("{}.cjs.js.flow", package.file_base()))
    }
}

impl AuxiliaryWriter for FsAuxiliaryWriter {
    fn write(&self, package: &Package, mode: AuxiliaryMode) -> Result<()> {
        let Some(contents) = flow_declaration(package, &self.out_dir, mode) else {
            return Ok(());
        };
        let path = self.flow_file(package);
        debug!(package = %package.name, ?path, ?mode, "writing flow declaration");
        self.fs.write(&path, contents.as_bytes())
    }
}

/// Declaration file text for `mode`, or `None` when nothing is written.
pub fn flow_declaration(package: &Package, out_dir: &str, mode: AuxiliaryMode) -> Option<String> {
    let entry = package.entrypoints.first()?;
    let specifier = relative_specifier(Path::new(out_dir), entry);

    match mode {
        AuxiliaryMode::None => None,
        AuxiliaryMode::Named => Some(format!("// @flow\nexport * from \"{specifier}\";\n")),
        AuxiliaryMode::All => Some(format!(
            "// @flow\nexport * from \"{specifier}\";\nexport {{ default }} from \"{specifier}\";\n"
        )),
    }
}

/// Import specifier reaching `entry` from inside `out_dir` (both relative
/// to the package directory).
fn relative_specifier(out_dir: &Path, entry: &Path) -> String {
    let depth = out_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    let mut parts: Vec<String> = vec!["..".to_string(); depth];
    parts.extend(
        entry
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            }),
    );
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::package::PackageJson;

    fn metadata(source: &str, exports: &[&str]) -> BundleMetadata {
        BundleMetadata {
            entry_source: source.to_string(),
            exports: exports.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn package() -> Package {
        let manifest: PackageJson = serde_json::from_str(r#"{ "name": "@ws/ui" }"#).unwrap();
        Package::from_manifest("/ws/ui", manifest, &[]).unwrap()
    }

    #[test]
    fn mode_follows_pragma_and_default_export() {
        assert_eq!(
            AuxiliaryMode::for_bundle(&metadata("// @flow\nexport default 1", &["default"])),
            AuxiliaryMode::All
        );
        assert_eq!(
            AuxiliaryMode::for_bundle(&metadata("/* @flow */ export const a = 1", &["a"])),
            AuxiliaryMode::Named
        );
        assert_eq!(
            AuxiliaryMode::for_bundle(&metadata("export default 1", &["default"])),
            AuxiliaryMode::None
        );
    }

    #[test]
    fn writes_declaration_for_all() {
        let fs = MockFileSystem::new();
        let writer = FsAuxiliaryWriter::new(Arc::new(fs.clone()), "dist");

        writer.write(&package(), AuxiliaryMode::All).unwrap();

        let contents = fs
            .read_to_string(Path::new("/ws/ui/dist/ws-ui.cjs.js.flow"))
            .unwrap();
        assert_eq!(
            contents,
            "// @flow\nexport * from \"../src/index.js\";\nexport { default } from \"../src/index.js\";\n"
        );
    }

    #[test]
    fn none_writes_nothing() {
        let fs = MockFileSystem::new();
        let writer = FsAuxiliaryWriter::new(Arc::new(fs.clone()), "dist");

        writer.write(&package(), AuxiliaryMode::None).unwrap();
        assert!(fs.files().is_empty());
    }

    #[test]
    fn nested_out_dirs_walk_further_up() {
        assert_eq!(
            relative_specifier(Path::new("build/lib"), Path::new("src/main.js")),
            "../../src/main.js"
        );
        assert_eq!(
            relative_specifier(Path::new("."), Path::new("index.js")),
            "./index.js"
        );
    }
}
