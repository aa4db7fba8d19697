// src/session/mod.rs

//! Watch sessions and their supervision.

pub mod outcome;
pub mod supervisor;
pub mod watch_session;

pub use outcome::{FailureKind, FailureOutcome, RetrySignal, SessionState};
pub use supervisor::RetrySupervisor;
pub use watch_session::{format_duration, Replanner, SessionContext, WatchSession};
