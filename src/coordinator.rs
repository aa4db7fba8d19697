// src/coordinator.rs

//! Runs every package of a workspace (or a single package) under its own
//! supervisor and aggregates their readiness.

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::auxiliary::AuxiliaryWriter;
use crate::build::{plan_package, PackagePlan};
use crate::config::ConfigFile;
use crate::engine::BuildEngine;
use crate::errors::{PkgwatchError, Result};
use crate::fs::FileSystem;
use crate::package::{discover, Aliases, Discovered, Package, PackageJson};
use crate::resolve::{ExternalClosureResolver, ManifestReader};
use crate::session::{Replanner, RetrySupervisor, SessionContext};

/// What a package supervisor reports back.
#[derive(Debug)]
enum SupervisorEvent {
    FirstReady { package: String },
    Failed { package: String, error: PkgwatchError },
}

#[derive(Clone)]
pub struct WorkspaceCoordinator {
    fs: Arc<dyn FileSystem>,
    config: Arc<ConfigFile>,
    manifests: Arc<dyn ManifestReader>,
    engine: Arc<dyn BuildEngine>,
    auxiliary: Arc<dyn AuxiliaryWriter>,
}

impl std::fmt::Debug for WorkspaceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceCoordinator")
            .field("config", &self.config)
            .field("manifests", &self.manifests)
            .finish_non_exhaustive()
    }
}

impl WorkspaceCoordinator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        config: Arc<ConfigFile>,
        manifests: Arc<dyn ManifestReader>,
        engine: Arc<dyn BuildEngine>,
        auxiliary: Arc<dyn AuxiliaryWriter>,
    ) -> Self {
        Self {
            fs,
            config,
            manifests,
            engine,
            auxiliary,
        }
    }

    /// Discover the packages under `root` and resolve every build
    /// configuration.
    ///
    /// Nothing is started; an unresolvable dependency in any package fails
    /// the whole plan.
    pub fn plan(&self, root: &Path) -> Result<Vec<PackagePlan>> {
        self.plan_workspace(root).map(|(plans, _)| plans)
    }

    fn plan_workspace(&self, root: &Path) -> Result<(Vec<PackagePlan>, Arc<ManifestReplanner>)> {
        let discovered = discover(self.fs.as_ref(), root, &self.config.build.default_targets)?;

        let aliases = Arc::new(match &discovered {
            Discovered::Workspace(packages) => Aliases::from_packages(packages),
            Discovered::SinglePackage(_) => Aliases::default(),
        });
        if !aliases.is_empty() {
            debug!(aliases = aliases.len(), "built workspace alias map");
        }

        let resolver = ExternalClosureResolver::new(
            Arc::clone(&self.manifests),
            self.config.resolve.allow_unresolvable.clone(),
        );

        let plans = discovered
            .into_packages()
            .into_iter()
            .map(|pkg| plan_package(Arc::new(pkg), &resolver, &aliases, &self.config.build))
            .collect::<Result<Vec<_>>>()?;

        let replanner = Arc::new(ManifestReplanner {
            fs: Arc::clone(&self.fs),
            config: Arc::clone(&self.config),
            manifests: Arc::clone(&self.manifests),
            resolver,
            aliases,
        });
        Ok((plans, replanner))
    }

    /// Start one supervisor per package and wait until each has been ready
    /// once.
    ///
    /// Fails with the first fatal error of any package. Packages that are
    /// still running when that happens are left running in the background.
    pub async fn run(&self, root: &Path) -> Result<RunningWorkspace> {
        let (plans, replanner) = self.plan_workspace(root)?;
        let total = plans.len();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut packages = Vec::with_capacity(total);

        for plan in plans {
            let ctx = self.session_context(plan, Arc::clone(&replanner));
            let package = ctx.package().name.clone();
            packages.push(package.clone());
            tasks.spawn(supervise_package(ctx, package, tx.clone()));
        }
        drop(tx);

        let mut ready = 0;
        while ready < total {
            match rx.recv().await {
                Some(SupervisorEvent::FirstReady { package }) => {
                    ready += 1;
                    debug!(package = %package, ready, total, "package ready");
                }
                Some(SupervisorEvent::Failed { package, error }) => {
                    error!(package = %package, error = %error, "stopped before the workspace was ready");
                    tasks.detach_all();
                    return Err(error);
                }
                None => {
                    return Err(PkgwatchError::Other(anyhow!(
                        "every supervisor stopped before the workspace was ready"
                    )));
                }
            }
        }

        info!(packages = total, "started watching");
        Ok(RunningWorkspace {
            packages,
            events: rx,
            tasks,
        })
    }

    fn session_context(&self, plan: PackagePlan, replanner: Arc<ManifestReplanner>) -> SessionContext {
        let build = &self.config.build;
        SessionContext {
            clean_dir: build.clean_out_dir.then(|| plan.out_dir(build)),
            plan,
            engine: Arc::clone(&self.engine),
            auxiliary: Arc::clone(&self.auxiliary),
            fs: Arc::clone(&self.fs),
            replanner: Some(replanner as Arc<dyn Replanner>),
        }
    }
}

/// Plans a package again from its `package.json`, with a fresh manifest
/// cache. The workspace alias map is kept from the initial plan.
struct ManifestReplanner {
    fs: Arc<dyn FileSystem>,
    config: Arc<ConfigFile>,
    manifests: Arc<dyn ManifestReader>,
    resolver: ExternalClosureResolver,
    aliases: Arc<Aliases>,
}

impl Replanner for ManifestReplanner {
    fn replan(&self, package: &Package) -> Result<PackagePlan> {
        self.manifests.invalidate();

        let path = package.manifest_path();
        let contents = self.fs.read_to_string(&path).map_err(|e| {
            PkgwatchError::ManifestError(format!("could not read {}: {:#}", path.display(), e))
        })?;
        let manifest = PackageJson::parse(&contents, &path)?;
        let fresh = Package::from_manifest(
            package.directory.clone(),
            manifest,
            &self.config.build.default_targets,
        )?;

        plan_package(Arc::new(fresh), &self.resolver, &self.aliases, &self.config.build)
    }
}

async fn supervise_package(
    ctx: SessionContext,
    package: String,
    tx: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let ready_tx = tx.clone();
    let ready_package = package.clone();
    let result = RetrySupervisor::new(ctx)
        .supervise(move || {
            let _ = ready_tx.send(SupervisorEvent::FirstReady {
                package: ready_package,
            });
        })
        .await;

    let error = match result {
        Ok(never) => match never {},
        Err(error) => error,
    };
    let _ = tx.send(SupervisorEvent::Failed { package, error });
}

/// Every package has been ready at least once and is still supervised.
///
/// Dropping it stops all supervisors.
#[derive(Debug)]
pub struct RunningWorkspace {
    packages: Vec<String>,
    events: mpsc::UnboundedReceiver<SupervisorEvent>,
    tasks: JoinSet<()>,
}

impl RunningWorkspace {
    /// Package names, in discovery order.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Wait for the first fatal failure of any package.
    pub async fn until_failure(&mut self) -> PkgwatchError {
        loop {
            match self.events.recv().await {
                Some(SupervisorEvent::Failed { package, error }) => {
                    error!(package = %package, error = %error, "package supervision stopped");
                    return error;
                }
                Some(SupervisorEvent::FirstReady { .. }) => continue,
                None => {
                    return PkgwatchError::Other(anyhow!("every supervisor stopped"));
                }
            }
        }
    }

    pub fn shutdown(mut self) {
        info!(packages = self.packages.len(), "shutting down");
        self.tasks.abort_all();
    }
}
