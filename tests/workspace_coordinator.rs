// tests/workspace_coordinator.rs

mod common;
use crate::common::{
    InMemoryManifests, RecordingAuxWriter, ScriptedEngine, Step, coordinator, eventually,
    init_tracing, three_package_workspace, with_timeout, ws_root,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use pkgwatch::errors::PkgwatchError;
use pkgwatch::fs::MockFileSystem;
use pkgwatch::types::BuildTarget;

#[tokio::test]
async fn resolves_only_after_every_package_was_ready() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());

    let gates: Vec<Arc<Notify>> = (0..3).map(|_| Arc::new(Notify::new())).collect();
    for (name, gate) in ["a", "b", "c"].into_iter().zip(&gates) {
        engine.script(name, vec![Step::WaitFor(gate.clone()), Step::Start, Step::Idle]);
    }

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let handle = tokio::spawn(async move { coordinator.run(ws_root()).await });

    // Release out of order: c, a, then b.
    gates[2].notify_one();
    gates[0].notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    gates[1].notify_one();
    let workspace = with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(workspace.packages(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    for name in ["a", "b", "c"] {
        assert_eq!(engine.watch_count(name), 1);
    }
    workspace.shutdown();
}

#[tokio::test]
async fn first_fatal_failure_rejects_the_run() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());
    engine.script("b", vec![Step::Fatal("Unexpected token".to_string())]);

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let err = with_timeout(coordinator.run(ws_root())).await.unwrap_err();

    match err {
        PkgwatchError::EngineFatal { package, message } => {
            assert_eq!(package, "b");
            assert_eq!(message, "Unexpected token");
        }
        other => panic!("expected EngineFatal, got {other:?}"),
    }
}

#[tokio::test]
async fn unresolvable_dependency_aborts_before_any_session() {
    init_tracing();
    let fs = three_package_workspace();
    fs.add_file(
        "/ws/packages/c/package.json",
        r#"{ "name": "c", "main": "dist/c.cjs.js", "dependencies": { "ghost": "^1.0.0" } }"#,
    );
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let err = with_timeout(coordinator.run(ws_root())).await.unwrap_err();

    assert!(matches!(
        err,
        PkgwatchError::UnresolvableDependency { ref package, ref name } if package == "c" && name == "ghost"
    ));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn later_fatal_failure_surfaces_through_the_running_workspace() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());
    let gate = Arc::new(Notify::new());
    engine.script(
        "a",
        vec![
            Step::Start,
            Step::Idle,
            Step::WaitFor(gate.clone()),
            Step::Fatal("late failure".to_string()),
        ],
    );

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let mut workspace = with_timeout(coordinator.run(ws_root())).await.unwrap();

    gate.notify_one();
    let err = with_timeout(workspace.until_failure()).await;

    assert_eq!(err.package(), Some("a"));
    assert!(err.to_string().contains("late failure"));
}

#[tokio::test]
async fn single_package_runs_without_aliases() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        "/solo/package.json",
        r#"{ "name": "solo", "main": "dist/solo.cjs.js", "umd:main": "dist/solo.umd.min.js", "peerDependencies": { "react": "*" } }"#,
    );
    let manifests = Arc::new(InMemoryManifests::new().with("react", &[], &[]));
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let workspace = with_timeout(coordinator.run(Path::new("/solo"))).await.unwrap();
    assert_eq!(workspace.packages(), &["solo".to_string()]);

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let targets: Vec<BuildTarget> = calls[0].configs.iter().map(|c| c.target).collect();
    assert_eq!(targets, vec![BuildTarget::Cjs, BuildTarget::Umd]);
    for config in &calls[0].configs {
        assert!(config.aliases.is_empty());
        assert!(config.external.is_external("react"));
    }
    assert!(calls[0].configs[0].external.is_external("fs"));
    assert!(!calls[0].configs[1].external.is_external("fs"));
}

#[tokio::test]
async fn plan_shares_one_alias_map_across_the_workspace() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());

    let plans = coordinator(&fs, &manifests, &engine, &aux).plan(ws_root()).unwrap();

    assert_eq!(plans.len(), 3);
    let aliases = &plans[0].configs[0].aliases;
    assert_eq!(
        aliases.get("b"),
        Some(&PathBuf::from("/ws/packages/b/src/index.js"))
    );
    for plan in &plans {
        assert!(Arc::ptr_eq(aliases, &plan.configs[0].aliases));
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn restarted_session_is_planned_from_the_changed_manifest() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new().with("react", &[], &[]));
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());
    let resume = Arc::new(Notify::new());
    engine.script("a", vec![Step::Start, Step::RecoverableAfter(resume.clone())]);

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let workspace = with_timeout(coordinator.run(ws_root())).await.unwrap();

    fs.add_file(
        "/ws/packages/a/package.json",
        r#"{ "name": "a", "main": "dist/a.cjs.js", "module": "dist/a.esm.js", "peerDependencies": { "react": "*" } }"#,
    );
    resume.notify_one();
    with_timeout(eventually(|| engine.watch_count("a") == 2)).await;

    let calls: Vec<_> = engine.calls().into_iter().filter(|c| c.package == "a").collect();
    assert_eq!(calls[0].configs.len(), 1);
    assert!(!calls[0].configs[0].external.is_external("react"));

    let targets: Vec<BuildTarget> = calls[1].configs.iter().map(|c| c.target).collect();
    assert_eq!(targets, vec![BuildTarget::Cjs, BuildTarget::Esm]);
    for config in &calls[1].configs {
        assert!(config.external.is_external("react"));
        assert!(Arc::ptr_eq(&config.aliases, &calls[0].configs[0].aliases));
    }
    assert_eq!(engine.max_live_sessions("a"), 1);
    workspace.shutdown();
}

#[tokio::test]
async fn unresolvable_dependency_after_a_restart_is_fatal() {
    init_tracing();
    let fs = three_package_workspace();
    let manifests = Arc::new(InMemoryManifests::new());
    let engine = Arc::new(ScriptedEngine::new());
    let aux = Arc::new(RecordingAuxWriter::new());
    let resume = Arc::new(Notify::new());
    engine.script("b", vec![Step::Start, Step::RecoverableAfter(resume.clone())]);

    let coordinator = coordinator(&fs, &manifests, &engine, &aux);
    let mut workspace = with_timeout(coordinator.run(ws_root())).await.unwrap();

    fs.add_file(
        "/ws/packages/b/package.json",
        r#"{ "name": "b", "main": "dist/b.cjs.js", "dependencies": { "ghost": "^1.0.0" } }"#,
    );
    resume.notify_one();
    let err = with_timeout(workspace.until_failure()).await;

    assert!(matches!(
        err,
        PkgwatchError::UnresolvableDependency { ref package, ref name } if package == "b" && name == "ghost"
    ));
    assert_eq!(engine.watch_count("b"), 1);
}
