// src/package/aliases.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::Package;

/// Cross-package alias map for a workspace: package name → entry source.
///
/// Built once per coordinator run and shared read-only by every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Aliases(BTreeMap<String, PathBuf>);

impl Aliases {
    pub fn from_packages<'a>(packages: impl IntoIterator<Item = &'a Package>) -> Self {
        Self(
            packages
                .into_iter()
                .map(|pkg| (pkg.name.clone(), pkg.main_entry()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
