use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One kind of artifact a package is built into.
///
/// - `Cjs`: CommonJS module for server-side runtimes (`main`).
/// - `Esm`: ES module for bundler consumers (`module`).
/// - `Browser`: CommonJS + ES module pair specialised for browser hosts
///   (`browser`).
/// - `Umd`: a single self-contained, minified file with its regular
///   dependencies inlined (`umd:main`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    Cjs,
    Esm,
    Browser,
    Umd,
}

impl BuildTarget {
    /// How the dependency closure must be computed for this target.
    pub fn bundle_mode(self) -> BundleMode {
        match self {
            BuildTarget::Cjs | BuildTarget::Esm => BundleMode {
                unified_bundle: false,
                browser_runtime: false,
            },
            BuildTarget::Browser => BundleMode {
                unified_bundle: false,
                browser_runtime: true,
            },
            BuildTarget::Umd => BundleMode {
                unified_bundle: true,
                browser_runtime: true,
            },
        }
    }

    pub fn environment(self) -> EnvironmentMode {
        match self {
            BuildTarget::Umd => EnvironmentMode::Production,
            _ => EnvironmentMode::Development,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildTarget::Cjs => "cjs",
            BuildTarget::Esm => "esm",
            BuildTarget::Browser => "browser",
            BuildTarget::Umd => "umd",
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cjs" => Ok(BuildTarget::Cjs),
            "esm" => Ok(BuildTarget::Esm),
            "browser" => Ok(BuildTarget::Browser),
            "umd" => Ok(BuildTarget::Umd),
            other => Err(format!(
                "invalid build target: {other} (expected \"cjs\", \"esm\", \"browser\" or \"umd\")"
            )),
        }
    }
}

/// Flags that decide which imports stay external for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BundleMode {
    /// Regular dependencies are inlined into one self-contained artifact
    /// instead of being left as runtime imports.
    pub unified_bundle: bool,
    /// The artifact runs inside a browser-like host, so platform built-in
    /// modules are not available as externals.
    pub browser_runtime: bool,
}

/// Module format of a single output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Cjs,
    Esm,
    Umd,
}

/// Value the engine substitutes for the runtime environment switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    #[default]
    Development,
    Production,
}

/// Which declaration files accompany a finished bundle.
///
/// - `All`: re-export named bindings and the default binding.
/// - `Named`: re-export named bindings only.
/// - `None`: write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxiliaryMode {
    All,
    Named,
    #[default]
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_umd_is_unified() {
        assert!(BuildTarget::Umd.bundle_mode().unified_bundle);
        for target in [BuildTarget::Cjs, BuildTarget::Esm, BuildTarget::Browser] {
            assert!(!target.bundle_mode().unified_bundle, "{target}");
        }
    }

    #[test]
    fn browser_hosts() {
        assert!(BuildTarget::Browser.bundle_mode().browser_runtime);
        assert!(BuildTarget::Umd.bundle_mode().browser_runtime);
        assert!(!BuildTarget::Cjs.bundle_mode().browser_runtime);
        assert!(!BuildTarget::Esm.bundle_mode().browser_runtime);
    }

    #[test]
    fn parses_targets_case_insensitively() {
        assert_eq!("UMD".parse::<BuildTarget>(), Ok(BuildTarget::Umd));
        assert_eq!(" esm ".parse::<BuildTarget>(), Ok(BuildTarget::Esm));
        assert!("iife".parse::<BuildTarget>().is_err());
    }

    #[test]
    fn umd_builds_for_production() {
        assert_eq!(BuildTarget::Umd.environment(), EnvironmentMode::Production);
        assert_eq!(BuildTarget::Cjs.environment(), EnvironmentMode::Development);
    }
}
