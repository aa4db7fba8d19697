// src/engine/mod.rs

//! Build engine collaborator.
//!
//! The engine turns sources into bundles; pkgwatch only configures it and
//! listens to the lifecycle events of its incremental watch sessions.
//!
//! - [`BuildEngine`] is the seam the session layer talks to; tests plug in a
//!   scripted fake.
//! - [`command`] holds the production engine, an external process speaking
//!   JSON lines (see [`wire`]).

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::build::BuildConfig;
use crate::errors::Result;
use crate::package::Package;
use crate::session::RetrySignal;

pub mod command;
pub mod wire;

pub use command::CommandEngine;

/// Build facts reported with a finished bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    /// Original source text of the entry module.
    pub entry_source: String,
    /// Names exported by the entry module.
    pub exports: Vec<String>,
}

/// Lifecycle events of one engine watch session.
#[derive(Debug)]
pub enum EngineEvent {
    /// The session started; sources are being watched.
    Start,
    /// One output target started building.
    BundleStart {
        inputs: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
    },
    /// One output target finished building.
    BundleEnd {
        outputs: Vec<PathBuf>,
        duration: Duration,
        metadata: BundleMetadata,
    },
    /// Every output is built; waiting for the next source change.
    Idle,
    /// Unrecoverable failure (syntax error, impossible configuration).
    FatalError { message: String },
    /// Transient failure; start a new session once `resume` completes.
    RecoverableError { message: String, resume: RetrySignal },
}

/// Handle to a running engine watch session.
///
/// Dropping the handle stops the session in the background; [`close`]
/// stops it and waits until the engine released it.
///
/// [`close`]: EngineWatch::close
#[derive(Debug)]
pub struct EngineWatch {
    events: mpsc::Receiver<EngineEvent>,
    stop: oneshot::Sender<()>,
    released: oneshot::Receiver<()>,
}

impl EngineWatch {
    /// A handle whose drop also drops `stop`, telling the engine to shut
    /// the session down.
    ///
    /// The engine drops (or fires) the sender of `released` once the
    /// session's resources are gone.
    pub fn new(
        events: mpsc::Receiver<EngineEvent>,
        stop: oneshot::Sender<()>,
        released: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            events,
            stop,
            released,
        }
    }

    /// Next lifecycle event, or `None` once the engine closed the session.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Stop the session and wait until the engine released it.
    pub async fn close(self) {
        let Self {
            events,
            stop,
            released,
        } = self;
        drop(events);
        drop(stop);
        let _ = released.await;
    }
}

/// Starts incremental watch sessions.
pub trait BuildEngine: Send + Sync {
    /// Start watching `package`, building every config in `configs`.
    fn watch(&self, package: &Package, configs: &[BuildConfig]) -> Result<EngineWatch>;
}
