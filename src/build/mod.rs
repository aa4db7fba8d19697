// src/build/mod.rs

//! Per-target build configuration handed to the build engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::BuildSection;
use crate::errors::Result;
use crate::package::{Aliases, Package};
use crate::resolve::{ExternalClosureResolver, ExternalMatcher};
use crate::types::{BuildTarget, EnvironmentMode, OutputFormat};

/// One output file of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub format: OutputFormat,
    /// Path relative to the package directory.
    pub file: PathBuf,
}

/// Everything the engine needs to build one target of one package.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub target: BuildTarget,
    /// Entry sources, absolute.
    pub entrypoints: Vec<PathBuf>,
    pub external: ExternalMatcher,
    pub outputs: Vec<OutputTarget>,
    pub environment: EnvironmentMode,
    /// Workspace siblings by name; empty for a single package.
    pub aliases: Arc<Aliases>,
}

/// A package together with its resolved build configurations.
#[derive(Debug, Clone)]
pub struct PackagePlan {
    pub package: Arc<Package>,
    pub configs: Vec<BuildConfig>,
}

impl PackagePlan {
    /// Absolute output directory of the package.
    pub fn out_dir(&self, build: &BuildSection) -> PathBuf {
        self.package.directory.join(&build.out_dir)
    }
}

/// Output files for `target`, relative to the package directory.
pub fn outputs_for(pkg: &Package, target: BuildTarget, out_dir: &str) -> Vec<OutputTarget> {
    let base = pkg.file_base();
    let out = Path::new(out_dir);
    let file = |suffix: &str| out.join(format!("{base}.{suffix}"));

    match target {
        BuildTarget::Cjs => vec![OutputTarget {
            format: OutputFormat::Cjs,
            file: file("cjs.js"),
        }],
        BuildTarget::Esm => vec![OutputTarget {
            format: OutputFormat::Esm,
            file: file("esm.js"),
        }],
        BuildTarget::Browser => vec![
            OutputTarget {
                format: OutputFormat::Cjs,
                file: file("browser.cjs.js"),
            },
            OutputTarget {
                format: OutputFormat::Esm,
                file: file("browser.esm.js"),
            },
        ],
        BuildTarget::Umd => vec![OutputTarget {
            format: OutputFormat::Umd,
            file: file("umd.min.js"),
        }],
    }
}

/// Resolve externals and assemble the build configurations of `pkg`, one
/// per declared target.
pub fn plan_package(
    pkg: Arc<Package>,
    resolver: &ExternalClosureResolver,
    aliases: &Arc<Aliases>,
    build: &BuildSection,
) -> Result<PackagePlan> {
    let mut configs = Vec::with_capacity(pkg.targets.len());

    for &target in &pkg.targets {
        let externals = resolver.resolve(&pkg, target.bundle_mode())?;
        debug!(
            package = %pkg.name,
            %target,
            externals = externals.len(),
            "planned build target"
        );

        configs.push(BuildConfig {
            target,
            entrypoints: pkg
                .entrypoints
                .iter()
                .map(|entry| pkg.directory.join(entry))
                .collect(),
            external: ExternalMatcher::compile(&externals)?,
            outputs: outputs_for(&pkg, target, &build.out_dir),
            environment: target.environment(),
            aliases: Arc::clone(aliases),
        });
    }

    Ok(PackagePlan {
        package: pkg,
        configs,
    })
}
