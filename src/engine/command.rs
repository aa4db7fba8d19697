// src/engine/command.rs

//! Build engine backed by an external watch process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::build::BuildConfig;
use crate::config::EngineSection;
use crate::errors::{PkgwatchError, Result};
use crate::package::Package;
use crate::watch::manifest_change_signal;

use super::wire::{WireEvent, WireRequest};
use super::{BuildEngine, EngineEvent, EngineWatch};

/// How long an engine that closed its stdout gets to exit on its own.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Spawns `command args...` in the package directory, sends it the build
/// request as JSON on stdin and translates its JSON-lines stdout into
/// [`EngineEvent`]s.
///
/// The process is killed when the returned [`EngineWatch`] is dropped;
/// [`EngineWatch::close`] returns once it is gone.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(engine: &EngineSection) -> Self {
        Self::new(engine.command.clone(), engine.args.clone())
    }
}

impl BuildEngine for CommandEngine {
    fn watch(&self, package: &Package, configs: &[BuildConfig]) -> Result<EngineWatch> {
        let request = serde_json::to_vec(&WireRequest::new(package, configs))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&package.directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning build engine '{}' for '{}'", self.program, package.name))
            .map_err(PkgwatchError::Other)?;

        info!(package = %package.name, engine = %self.program, "engine process started");

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(32);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (released_tx, released_rx) = oneshot::channel::<()>();

        tokio::spawn(drive_process(
            child,
            request,
            package.name.clone(),
            package.manifest_path(),
            event_tx,
            stop_rx,
            released_tx,
        ));

        Ok(EngineWatch::new(event_rx, stop_tx, released_rx))
    }
}

/// Owns the child process for the lifetime of one session.
///
/// `_released` is dropped on return, after the child was reaped.
async fn drive_process(
    mut child: Child,
    request: Vec<u8>,
    package: String,
    manifest_path: PathBuf,
    event_tx: mpsc::Sender<EngineEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    _released: oneshot::Sender<()>,
) {
    if let Some(mut stdin) = child.stdin.take() {
        let package = package.clone();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&request).await {
                warn!(package = %package, error = %e, "failed to send build request to engine");
            }
            // Dropping stdin closes it, which ends the request.
        });
    }

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let package = package.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(package = %package, "engine stderr: {}", line);
            }
        });
    }

    let Some(stdout) = child.stdout.take() else {
        let _ = event_tx
            .send(EngineEvent::FatalError {
                message: "engine stdout is not available".to_string(),
            })
            .await;
        return;
    };
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match WireEvent::parse(line) {
                            Ok(wire) => {
                                let event = wire.into_event(|| manifest_change_signal(manifest_path.clone()));
                                if event_tx.send(event).await.is_err() {
                                    debug!(package = %package, "session gone; stopping engine");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(package = %package, error = %e, "engine stdout: {}", line);
                            }
                        }
                    }
                    Ok(None) | Err(_) => {
                        let message = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                            Ok(Ok(status)) => format!("engine exited unexpectedly ({status})"),
                            Ok(Err(e)) => format!("engine exited unexpectedly: {e}"),
                            Err(_) => "engine closed its output".to_string(),
                        };
                        let _ = event_tx.send(EngineEvent::FatalError { message }).await;
                        break;
                    }
                }
            }

            _ = &mut stop_rx => {
                debug!(package = %package, "engine session dropped; killing process");
                break;
            }
        }
    }

    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill().await {
            warn!(package = %package, error = %e, "failed to kill engine process");
        }
    }
}
