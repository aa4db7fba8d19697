#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};

use pkgwatch::auxiliary::AuxiliaryWriter;
use pkgwatch::build::BuildConfig;
use pkgwatch::engine::{BuildEngine, BundleMetadata, EngineEvent, EngineWatch};
use pkgwatch::errors::Result;
use pkgwatch::package::Package;
use pkgwatch::session::RetrySignal;
use pkgwatch::types::AuxiliaryMode;

/// One scripted action of a fake engine session.
#[derive(Debug, Clone)]
pub enum Step {
    Start,
    BundleEnd(BundleMetadata),
    Idle,
    /// Recoverable error whose resume signal is already satisfied.
    Recoverable,
    /// Recoverable error resuming once the notify fires.
    RecoverableAfter(Arc<Notify>),
    Fatal(String),
    Delay(Duration),
    /// Pause the script until the notify fires.
    WaitFor(Arc<Notify>),
}

/// A `watch` call the engine received.
#[derive(Debug, Clone)]
pub struct WatchCall {
    pub package: String,
    pub configs: Vec<BuildConfig>,
}

/// Live session counts of one package.
#[derive(Debug, Default)]
struct Liveness {
    live: AtomicUsize,
    max: AtomicUsize,
}

/// A fake build engine that:
/// - plays one queued script per `watch` call, per package
/// - records every `watch` call
/// - keeps the session open after the script ends until it is stopped
/// - counts how many sessions of a package are alive at once.
///
/// Packages without a queued script just start and go idle.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, VecDeque<Vec<Step>>>>,
    calls: Mutex<Vec<WatchCall>>,
    liveness: Mutex<HashMap<String, Arc<Liveness>>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the script for the next session of `package`.
    pub fn script(&self, package: &str, steps: Vec<Step>) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(package.to_string())
            .or_default()
            .push_back(steps);
        self
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn watch_count(&self, package: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.package == package)
            .count()
    }

    /// Sessions of `package` that were started and not yet released.
    pub fn live_sessions(&self, package: &str) -> usize {
        self.liveness_of(package).live.load(Ordering::SeqCst)
    }

    /// Most sessions of `package` ever alive at the same time.
    pub fn max_live_sessions(&self, package: &str) -> usize {
        self.liveness_of(package).max.load(Ordering::SeqCst)
    }

    fn liveness_of(&self, package: &str) -> Arc<Liveness> {
        self.liveness
            .lock()
            .unwrap()
            .entry(package.to_string())
            .or_default()
            .clone()
    }
}

async fn play(steps: Vec<Step>, tx: mpsc::Sender<EngineEvent>) {
    for step in steps {
        let event = match step {
            Step::Delay(d) => {
                tokio::time::sleep(d).await;
                continue;
            }
            Step::WaitFor(notify) => {
                notify.notified().await;
                continue;
            }
            Step::Start => EngineEvent::Start,
            Step::BundleEnd(metadata) => EngineEvent::BundleEnd {
                outputs: Vec::new(),
                duration: Duration::from_millis(5),
                metadata,
            },
            Step::Idle => EngineEvent::Idle,
            Step::Recoverable => EngineEvent::RecoverableError {
                message: "manifest changed".to_string(),
                resume: RetrySignal::immediate(),
            },
            Step::RecoverableAfter(notify) => EngineEvent::RecoverableError {
                message: "manifest changed".to_string(),
                resume: RetrySignal::new(async move { notify.notified().await }),
            },
            Step::Fatal(message) => EngineEvent::FatalError { message },
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
    tx.closed().await;
}

impl BuildEngine for ScriptedEngine {
    fn watch(&self, package: &Package, configs: &[BuildConfig]) -> Result<EngineWatch> {
        self.calls.lock().unwrap().push(WatchCall {
            package: package.name.clone(),
            configs: configs.to_vec(),
        });

        let steps = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&package.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| vec![Step::Start, Step::Idle]);

        let liveness = self.liveness_of(&package.name);
        let now = liveness.live.fetch_add(1, Ordering::SeqCst) + 1;
        liveness.max.fetch_max(now, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (released_tx, released_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::select! {
                _ = play(steps, tx) => {}
                _ = stop_rx => {}
            }
            liveness.live.fetch_sub(1, Ordering::SeqCst);
            drop(released_tx);
        });

        Ok(EngineWatch::new(rx, stop_tx, released_rx))
    }
}

/// Auxiliary writer that records `(package, mode)` calls and can be told
/// to fail.
#[derive(Debug, Default)]
pub struct RecordingAuxWriter {
    writes: Mutex<Vec<(String, AuxiliaryMode)>>,
    fail: AtomicBool,
}

impl RecordingAuxWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let writer = Self::default();
        writer.fail.store(true, Ordering::SeqCst);
        writer
    }

    pub fn writes(&self) -> Vec<(String, AuxiliaryMode)> {
        self.writes.lock().unwrap().clone()
    }
}

impl AuxiliaryWriter for RecordingAuxWriter {
    fn write(&self, package: &Package, mode: AuxiliaryMode) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.writes
            .lock()
            .unwrap()
            .push((package.name.clone(), mode));
        Ok(())
    }
}
