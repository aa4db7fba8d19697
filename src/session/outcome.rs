// src/session/outcome.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::errors::PkgwatchError;

/// Completes when a session that failed recoverably may be started again.
///
/// Produced by the build engine (for the process engine: when the package
/// manifest changes). Opaque to the session and the supervisor.
pub struct RetrySignal(Pin<Box<dyn Future<Output = ()> + Send + 'static>>);

impl RetrySignal {
    pub fn new(fut: impl Future<Output = ()> + Send + 'static) -> Self {
        Self(Box::pin(fut))
    }

    /// A signal that is already satisfied.
    pub fn immediate() -> Self {
        Self::new(std::future::ready(()))
    }
}

impl Future for RetrySignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.0.as_mut().poll(cx)
    }
}

impl fmt::Debug for RetrySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySignal").finish_non_exhaustive()
    }
}

/// How a watch session ended.
#[derive(Debug)]
pub enum FailureOutcome {
    /// Stop supervising the package and report `cause`.
    Fatal(PkgwatchError),
    /// Wait for the signal, then start a fresh session.
    Recoverable(RetrySignal),
}

impl FailureOutcome {
    pub fn kind(&self) -> FailureKind {
        match self {
            FailureOutcome::Fatal(_) => FailureKind::Fatal,
            FailureOutcome::Recoverable(_) => FailureKind::Recoverable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Fatal,
    Recoverable,
}

/// Lifecycle of one watch session.
///
/// `Starting` → `Running` on the first finished bundle; any engine failure
/// → `Errored`; `Terminated` only through [`super::WatchSession::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Errored(FailureKind),
    Terminated,
}
