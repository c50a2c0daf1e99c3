//! Polling-based dataset watcher.
//!
//! Checks the mtimes of the three dataset files every poll interval. When any
//! of them changes, waits out a short debounce (editors and sync tools often
//! write in stages), then runs [`ResourceCatalog::reload`] on the blocking pool and reports the
//! outcome on an mpsc channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{CatalogStats, ResourceCatalog};
use crate::config::defaults;

/// Events emitted by the catalog watcher.
#[derive(Debug)]
pub enum CatalogEvent {
    /// Datasets were reloaded and the new snapshot is active.
    Reloaded(CatalogStats),
    /// Reload was attempted but failed (previous snapshot remains active).
    Error(String),
}

const DEBOUNCE_DELAY: Duration = Duration::from_millis(defaults::CATALOG_DEBOUNCE_MS);

type Fingerprint = Vec<Option<SystemTime>>;

/// Run the dataset watcher loop.
///
/// Returns when `cancel` fires, when the channel is closed, or immediately
/// when the catalog has no data directory.
pub async fn run_catalog_watcher(
    catalog: Arc<ResourceCatalog>,
    poll_interval: Duration,
    tx: mpsc::Sender<CatalogEvent>,
    cancel: CancellationToken,
) {
    let Some(dir) = catalog.data_dir().map(Path::to_path_buf) else {
        tracing::warn!("Catalog has no data directory, watcher not started");
        return;
    };
    let files = dataset_paths(&dir);
    tracing::info!(dir = %dir.display(), interval_secs = poll_interval.as_secs(), "Catalog watcher started");

    let mut last = fingerprint(&files);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Catalog watcher cancelled");
                return;
            }
            () = tokio::time::sleep(poll_interval) => {}
        }

        let current = fingerprint(&files);
        if current == last {
            continue;
        }

        // Debounce: wait, then re-check to make sure writes have settled
        tokio::time::sleep(DEBOUNCE_DELAY).await;
        if fingerprint(&files) != current {
            continue;
        }
        last = current;

        let reloading = catalog.clone();
        let event = match tokio::task::spawn_blocking(move || reloading.reload()).await {
            Ok(Ok(stats)) => CatalogEvent::Reloaded(stats),
            Ok(Err(e)) => CatalogEvent::Error(e.to_string()),
            Err(e) => CatalogEvent::Error(format!("reload task failed: {e}")),
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Catalog watcher channel closed, stopping");
            return;
        }
    }
}

fn dataset_paths(dir: &Path) -> [PathBuf; 3] {
    [
        dir.join(defaults::AMBULANCES_FILE),
        dir.join(defaults::HOSPITALS_FILE),
        dir.join(defaults::PERSONNEL_FILE),
    ]
}

/// Modification times of every dataset; `None` for files that are missing.
fn fingerprint(files: &[PathBuf]) -> Fingerprint {
    files
        .iter()
        .map(|p| std::fs::metadata(p).ok().and_then(|m| m.modified().ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watcher_reloads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(ResourceCatalog::load(dir.path()).unwrap());
        assert!(catalog.available_ambulances().is_empty());

        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_catalog_watcher(
            Arc::clone(&catalog),
            Duration::from_millis(50),
            tx,
            cancel.clone(),
        ));

        // Let the watcher take its baseline fingerprint first
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(
            dir.path().join("ambulances.json"),
            r#"{"ambulances": [{"id": "A1", "location": {"lat": 1.0, "lng": 1.0}, "status": "available"}]}"#,
        )
        .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            CatalogEvent::Reloaded(stats) => assert_eq!(stats.ambulances_available, 1),
            CatalogEvent::Error(e) => panic!("unexpected reload error: {e}"),
        }
        assert_eq!(catalog.available_ambulances().len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_watcher_without_dir_returns() {
        let (tx, _rx) = mpsc::channel(1);
        run_catalog_watcher(
            Arc::new(ResourceCatalog::empty()),
            Duration::from_millis(10),
            tx,
            CancellationToken::new(),
        )
        .await;
    }
}
