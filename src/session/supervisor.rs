// src/session/supervisor.rs

use std::convert::Infallible;

use tracing::{debug, error, info};

use crate::errors::{PkgwatchError, Result};

use super::outcome::FailureOutcome;
use super::watch_session::{SessionContext, WatchSession};

/// Bookkeeping shared by every session of one supervised package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RetryContext {
    /// Number of sessions restarted so far.
    depth: u32,
    /// Whether the first-ready callback already ran.
    ready_fired: bool,
}

/// Keeps one package's watch session alive across recoverable failures.
///
/// At most one session exists at a time: the failed session is shut down
/// before its replacement starts. Every replacement is planned again from
/// the package's current manifest.
#[derive(Debug)]
pub struct RetrySupervisor {
    ctx: SessionContext,
    retry: RetryContext,
}

impl RetrySupervisor {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            retry: RetryContext::default(),
        }
    }

    /// Run sessions until one fails fatally.
    ///
    /// `on_first_ready` runs exactly once, the first time any session of
    /// this package reports ready, regardless of how many restarts came
    /// before. The returned error is the fatal cause, unchanged.
    pub async fn supervise<F>(mut self, on_first_ready: F) -> Result<Infallible>
    where
        F: FnOnce() + Send,
    {
        let mut on_first_ready = Some(on_first_ready);

        loop {
            let package = self.ctx.package().name.clone();
            let session = WatchSession::start(&self.ctx)?;
            debug!(package = %package, depth = self.retry.depth, "watch session started");

            let outcome = self.await_outcome(session, &mut on_first_ready).await;

            match outcome {
                FailureOutcome::Fatal(cause) => {
                    error!(package = %package, depth = self.retry.depth, error = %cause, "watch session failed");
                    return Err(cause);
                }
                FailureOutcome::Recoverable(resume) => {
                    info!(package = %package, "waiting for changes before restarting...");
                    resume.await;
                    self.retry.depth += 1;
                    self.replan()?;
                    info!(package = %package, depth = self.retry.depth, "restarting watch session");
                }
            }
        }
    }

    /// Replace the plan with one built from the current manifest.
    fn replan(&mut self) -> Result<()> {
        let Some(replanner) = self.ctx.replanner.clone() else {
            return Ok(());
        };
        let package = self.ctx.package().name.clone();

        match replanner.replan(self.ctx.package()) {
            Ok(plan) => {
                debug!(package = %package, configs = plan.configs.len(), "re-planned package");
                self.ctx.plan = plan;
                Ok(())
            }
            Err(cause) => {
                error!(package = %package, depth = self.retry.depth, error = %cause, "could not re-plan package");
                Err(cause)
            }
        }
    }

    /// Wait for `session` to fail, firing the first-ready callback on the way.
    async fn await_outcome<F>(
        &mut self,
        mut session: WatchSession,
        on_first_ready: &mut Option<F>,
    ) -> FailureOutcome
    where
        F: FnOnce(),
    {
        let package = self.ctx.package().name.clone();

        let failure = tokio::select! {
            biased;

            ready = &mut session.ready => {
                if ready.is_ok() && !self.retry.ready_fired {
                    self.retry.ready_fired = true;
                    if let Some(callback) = on_first_ready.take() {
                        callback();
                    }
                }
                (&mut session.failure).await
            }
            failure = &mut session.failure => failure,
        };

        session.shutdown().await;

        failure.unwrap_or_else(|_| {
            FailureOutcome::Fatal(PkgwatchError::EngineFatal {
                package,
                message: "watch session ended without reporting an outcome".to_string(),
            })
        })
    }
}
