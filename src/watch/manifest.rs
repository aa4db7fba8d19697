// src/watch/manifest.rs

//! Waiting for a package manifest to change.
//!
//! Used as the resume signal of recoverable engine failures: the session is
//! rebuilt once the package's dependency declaration actually changed.
//! Only content changes count; a touch or an editor's rewrite of identical
//! bytes does not.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::RetrySignal;
use crate::watch::hash::try_file_hash;

/// Poll interval when a native watcher cannot be created.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A signal that completes once the content of `path` differs from what it
/// is right now.
pub fn manifest_change_signal(path: impl Into<PathBuf>) -> RetrySignal {
    let path = path.into();
    let baseline = try_file_hash(&path);

    RetrySignal::new(async move {
        if let Err(e) = wait_with_watcher(&path, baseline.as_deref()).await {
            warn!(?path, error = %e, "file watcher unavailable; polling for manifest change");
            poll_for_change(&path, baseline.as_deref(), POLL_INTERVAL).await;
        }
        debug!(?path, "manifest changed");
    })
}

async fn wait_with_watcher(path: &Path, baseline: Option<&str>) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| anyhow!("manifest path {:?} has no parent directory", path))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = event_tx.send(event);
            }
        },
        Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    // Changes made before the watcher existed produce no event.
    if try_file_hash(path).as_deref() != baseline {
        return Ok(());
    }

    while let Some(event) = event_rx.recv().await {
        let touches_manifest = event
            .paths
            .iter()
            .any(|p| p.file_name() == path.file_name());
        if !touches_manifest {
            continue;
        }
        if try_file_hash(path).as_deref() != baseline {
            return Ok(());
        }
        debug!(?path, "manifest event without content change; still waiting");
    }

    Err(anyhow!("file watcher for {:?} stopped", dir))
}

/// Re-hash `path` every `interval` until its content differs from
/// `baseline`.
pub async fn poll_for_change(path: &Path, baseline: Option<&str>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if try_file_hash(path).as_deref() != baseline {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn polling_notices_rewritten_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, r#"{ "name": "a" }"#).unwrap();
        let baseline = try_file_hash(&path);

        let waiter = {
            let path = path.clone();
            tokio::spawn(async move {
                poll_for_change(&path, baseline.as_deref(), Duration::from_millis(10)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished(), "identical content must not count as a change");

        std::fs::write(&path, r#"{ "name": "a", "peerDependencies": { "react": "*" } }"#).unwrap();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("change detected")
            .unwrap();
    }

    #[tokio::test]
    async fn change_made_before_the_signal_is_awaited_still_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, r#"{ "name": "a" }"#).unwrap();

        let signal = manifest_change_signal(path.clone());
        std::fs::write(&path, r#"{ "name": "a", "dependencies": { "left-pad": "*" } }"#).unwrap();

        tokio::time::timeout(Duration::from_secs(3), signal)
            .await
            .expect("signal completes for an earlier change");
    }

    #[tokio::test]
    async fn signal_waits_while_content_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, r#"{ "name": "a" }"#).unwrap();

        let signal = manifest_change_signal(path.clone());
        std::fs::write(&path, r#"{ "name": "a" }"#).unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(300), signal).await;
        assert!(pending.is_err(), "rewriting identical bytes is not a change");
    }
}
