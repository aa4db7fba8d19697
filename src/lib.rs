// src/lib.rs

pub mod auxiliary;
pub mod build;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod package;
pub mod resolve;
pub mod session;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::auxiliary::{AuxiliaryWriter, FsAuxiliaryWriter};
use crate::build::PackagePlan;
use crate::cli::CliArgs;
use crate::config::{load_and_validate, load_for_root};
use crate::coordinator::WorkspaceCoordinator;
use crate::engine::{BuildEngine, CommandEngine};
use crate::fs::{FileSystem, RealFileSystem};
use crate::resolve::{ManifestReader, NodeModulesReader};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - package discovery and external resolution
/// - one supervised engine session per package
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let root = PathBuf::from(&args.directory);
    let cfg = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => load_for_root(&root)?,
    };
    let cfg = Arc::new(cfg);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    // One reader (and manifest cache) per run.
    let manifests: Arc<dyn ManifestReader> = Arc::new(NodeModulesReader::new(Arc::clone(&fs)));
    let engine: Arc<dyn BuildEngine> = Arc::new(CommandEngine::from_config(&cfg.engine));
    let auxiliary: Arc<dyn AuxiliaryWriter> = Arc::new(FsAuxiliaryWriter::new(
        Arc::clone(&fs),
        cfg.build.out_dir.clone(),
    ));

    let coordinator = WorkspaceCoordinator::new(fs, Arc::clone(&cfg), manifests, engine, auxiliary);

    if args.dry_run {
        let plans = coordinator.plan(&root)?;
        print_dry_run(&plans);
        return Ok(());
    }

    let mut workspace = tokio::select! {
        workspace = coordinator.run(&root) => workspace?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted before every package was ready");
            return Ok(());
        }
    };

    tokio::select! {
        error = workspace.until_failure() => Err(error.into()),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            workspace.shutdown();
            Ok(())
        }
    }
}

/// Print every package's build targets and external modules.
fn print_dry_run(plans: &[PackagePlan]) {
    println!("pkgwatch dry-run");
    println!();

    for plan in plans {
        let pkg = &plan.package;
        println!("{} ({})", pkg.name, pkg.directory.display());
        for config in &plan.configs {
            println!("  - {}", config.target);
            for output in &config.outputs {
                println!("      output: {}", output.file.display());
            }
            let names = config.external.names();
            if names.is_empty() {
                println!("      external: (none)");
            } else {
                println!("      external ({}): {}", names.len(), names.join(", "));
            }
            if !config.aliases.is_empty() {
                println!("      aliases: {}", config.aliases.len());
            }
        }
    }

    debug!("dry-run complete (no sessions started)");
}
