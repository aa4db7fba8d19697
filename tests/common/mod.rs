#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use pkgwatch::build::plan_package;
use pkgwatch::config::{BuildSection, ConfigFile};
use pkgwatch::coordinator::WorkspaceCoordinator;
use pkgwatch::fs::MockFileSystem;
use pkgwatch::package::{Aliases, Package};
use pkgwatch::resolve::ExternalClosureResolver;
use pkgwatch::session::SessionContext;

pub use pkgwatch_test_utils::builders::{InMemoryManifests, PackageBuilder};
pub use pkgwatch_test_utils::fake_engine::{RecordingAuxWriter, ScriptedEngine, Step};
pub use pkgwatch_test_utils::{init_tracing, with_timeout};

/// `/ws` workspace with packages `a`, `b` and `c` under `packages/`.
pub fn three_package_workspace() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/ws/package.json", r#"{ "private": true, "workspaces": ["packages/*"] }"#);
    for name in ["a", "b", "c"] {
        fs.add_file(
            format!("/ws/packages/{name}/package.json"),
            format!(r#"{{ "name": "{name}", "main": "dist/{name}.cjs.js" }}"#),
        );
        fs.add_file(format!("/ws/packages/{name}/src/index.js"), "export default 1;");
    }
    fs
}

pub fn coordinator(
    fs: &MockFileSystem,
    manifests: &Arc<InMemoryManifests>,
    engine: &Arc<ScriptedEngine>,
    auxiliary: &Arc<RecordingAuxWriter>,
) -> WorkspaceCoordinator {
    WorkspaceCoordinator::new(
        Arc::new(fs.clone()),
        Arc::new(ConfigFile::default()),
        manifests.clone(),
        engine.clone(),
        auxiliary.clone(),
    )
}

/// Session context for a dependency-free package, without output cleaning
/// or re-planning.
pub fn session_context(
    pkg: Package,
    fs: &MockFileSystem,
    engine: &Arc<ScriptedEngine>,
    auxiliary: &Arc<RecordingAuxWriter>,
) -> SessionContext {
    let resolver = ExternalClosureResolver::new(Arc::new(InMemoryManifests::new()), BTreeSet::new());
    let plan = plan_package(
        Arc::new(pkg),
        &resolver,
        &Arc::new(Aliases::default()),
        &BuildSection::default(),
    )
    .expect("planning a dependency-free package");

    SessionContext {
        plan,
        engine: engine.clone(),
        auxiliary: auxiliary.clone(),
        fs: Arc::new(fs.clone()),
        clean_dir: None,
        replanner: None,
    }
}

/// Poll `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

pub fn ws_root() -> &'static Path {
    Path::new("/ws")
}
