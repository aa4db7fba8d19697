// src/resolve/mod.rs

//! Deciding which imports stay external.
//!
//! - [`manifest`] reads installed modules' dependency lists.
//! - [`closure`] computes a package's external module names.
//! - [`matcher`] compiles those names into an import predicate.
//! - [`builtins`] lists the runtime's built-in modules.

pub mod builtins;
pub mod closure;
pub mod manifest;
pub mod matcher;

pub use builtins::BUILTIN_MODULES;
pub use closure::{ExternalClosureResolver, ExternalNameSet};
pub use manifest::{DependencyManifest, ManifestCache, ManifestReader, NodeModulesReader};
pub use matcher::ExternalMatcher;
