// src/watch/mod.rs

//! Filesystem change detection.
//!
//! Turns "the package manifest changed" into a [`crate::session::RetrySignal`]
//! using a `notify` watcher and blake3 content hashes.

pub mod hash;
pub mod manifest;

pub use hash::compute_file_hash;
pub use manifest::manifest_change_signal;
