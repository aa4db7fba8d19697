// src/session/watch_session.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auxiliary::AuxiliaryWriter;
use crate::build::PackagePlan;
use crate::engine::{BuildEngine, EngineEvent, EngineWatch};
use crate::errors::{PkgwatchError, Result};
use crate::fs::{relative_str, FileSystem};
use crate::package::Package;
use crate::types::AuxiliaryMode;

use super::outcome::{FailureOutcome, SessionState};

/// Rebuilds a package's plan from what is on disk now.
///
/// Called by the supervisor before every restart, since a recoverable
/// failure means the package's dependencies changed.
pub trait Replanner: Send + Sync {
    fn replan(&self, package: &Package) -> Result<PackagePlan>;
}

/// Everything needed to (re)start a package's watch session.
#[derive(Clone)]
pub struct SessionContext {
    pub plan: PackagePlan,
    pub engine: Arc<dyn BuildEngine>,
    pub auxiliary: Arc<dyn AuxiliaryWriter>,
    pub fs: Arc<dyn FileSystem>,
    /// Removed before every session start, when set.
    pub clean_dir: Option<PathBuf>,
    /// Without one, restarts reuse `plan`.
    pub replanner: Option<Arc<dyn Replanner>>,
}

impl SessionContext {
    pub fn package(&self) -> &Arc<Package> {
        &self.plan.package
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("package", &self.plan.package.name)
            .field("configs", &self.plan.configs.len())
            .field("clean_dir", &self.clean_dir)
            .field("replans", &self.replanner.is_some())
            .finish_non_exhaustive()
    }
}

/// One engine watch session for one package.
///
/// - `ready` resolves once, when the engine reports the session started.
/// - `failure` resolves once, with how the session ended.
///
/// The outcome is reported only after the engine released the session.
/// Dropping the session stops the engine in the background.
pub struct WatchSession {
    pub ready: oneshot::Receiver<()>,
    pub failure: oneshot::Receiver<FailureOutcome>,
    state: Arc<watch::Sender<SessionState>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Clean the output directory and start an engine session.
    pub fn start(ctx: &SessionContext) -> Result<Self> {
        let package = Arc::clone(ctx.package());

        if let Some(dir) = &ctx.clean_dir {
            debug!(package = %package.name, ?dir, "cleaning output directory");
            ctx.fs.remove_dir_all(dir).map_err(PkgwatchError::Other)?;
        }

        let engine_watch = ctx.engine.watch(&package, &ctx.plan.configs)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (failure_tx, failure_rx) = oneshot::channel();
        let state = Arc::new(watch::Sender::new(SessionState::Starting));

        let task = tokio::spawn(drive_session(
            engine_watch,
            package,
            Arc::clone(&ctx.auxiliary),
            ready_tx,
            failure_tx,
            Arc::clone(&state),
        ));

        Ok(Self {
            ready: ready_rx,
            failure: failure_rx,
            state,
            task,
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// State updates that stay readable after the session is gone.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Stop the session for good and wait for its task to finish.
    ///
    /// Subscribers see `Terminated` once this returns.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        self.state.send_replace(SessionState::Terminated);
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Translate engine events until the session ends, then report the outcome.
async fn drive_session(
    mut engine_watch: EngineWatch,
    package: Arc<Package>,
    auxiliary: Arc<dyn AuxiliaryWriter>,
    ready_tx: oneshot::Sender<()>,
    failure_tx: oneshot::Sender<FailureOutcome>,
    state: Arc<watch::Sender<SessionState>>,
) {
    let mut ready_tx = Some(ready_tx);

    let outcome = loop {
        let Some(event) = engine_watch.next_event().await else {
            break FailureOutcome::Fatal(PkgwatchError::EngineFatal {
                package: package.name.clone(),
                message: "build engine closed the session".to_string(),
            });
        };

        match event {
            EngineEvent::Start => {
                debug!(package = %package.name, "engine session started");
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(());
                }
            }
            EngineEvent::BundleStart { inputs, outputs } => {
                info!(
                    package = %package.name,
                    "bundles {} → {}...",
                    display_paths(&inputs),
                    display_paths(&outputs)
                );
            }
            EngineEvent::BundleEnd {
                outputs,
                duration,
                metadata,
            } => {
                let mode = AuxiliaryMode::for_bundle(&metadata);
                if let Err(source) = auxiliary.write(&package, mode) {
                    break FailureOutcome::Fatal(PkgwatchError::AuxiliaryWrite {
                        package: package.name.clone(),
                        source,
                    });
                }
                state.send_replace(SessionState::Running);
                info!(
                    package = %package.name,
                    "created {} in {}",
                    display_paths(&outputs),
                    format_duration(duration)
                );
            }
            EngineEvent::Idle => {
                info!(package = %package.name, "waiting for changes...");
            }
            EngineEvent::FatalError { message } => {
                break FailureOutcome::Fatal(PkgwatchError::EngineFatal {
                    package: package.name.clone(),
                    message,
                });
            }
            EngineEvent::RecoverableError { message, resume } => {
                warn!(package = %package.name, %message, "build interrupted; session will restart");
                break FailureOutcome::Recoverable(resume);
            }
        }
    };

    engine_watch.close().await;
    state.send_replace(SessionState::Errored(outcome.kind()));
    let _ = failure_tx.send(outcome);
}

fn display_paths(paths: &[PathBuf]) -> String {
    let cwd = std::env::current_dir().ok();
    paths
        .iter()
        .map(|p| display_path(cwd.as_deref(), p))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_path(cwd: Option<&Path>, path: &Path) -> String {
    cwd.and_then(|cwd| relative_str(cwd, path))
        .unwrap_or_else(|| path.display().to_string())
}

/// Short human form: `840ms`, `2.3s`, `1m 5s`.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
