//! Catalog Integration Tests
//!
//! Loads datasets from temporary directories and checks that readers
//! running alongside reloads always see one complete snapshot.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use emergency_response::catalog::{run_catalog_watcher, CatalogEvent, ResourceCatalog};
use emergency_response::geo::rank;
use emergency_response::types::Location;

fn ambulances_json(prefix: &str, count: usize) -> String {
    let units: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"id": "{prefix}-{i}", "location": {{"lat": {}, "lng": -73.98}}, "status": "available", "type": "ALS"}}"#,
                40.70 + i as f64 * 0.01
            )
        })
        .collect();
    format!(r#"{{"ambulances": [{}]}}"#, units.join(","))
}

fn hospitals_json(prefix: &str, count: usize) -> String {
    let units: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"id": "{prefix}-H{i}", "name": "{prefix} Hospital {i}", "location": {{"lat": 40.75, "lng": {}}}, "emergency_department": {{"total_beds": 20, "available_beds": 3}}}}"#,
                -73.99 + i as f64 * 0.01
            )
        })
        .collect();
    format!(r#"{{"hospitals": [{}]}}"#, units.join(","))
}

fn write_generation(dir: &Path, prefix: &str, count: usize) {
    std::fs::write(dir.join("ambulances.json"), ambulances_json(prefix, count)).unwrap();
    std::fs::write(dir.join("hospitals.json"), hospitals_json(prefix, count)).unwrap();
}

#[test]
fn test_load_and_rank_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_generation(dir.path(), "A", 4);
    let catalog = ResourceCatalog::load(dir.path()).unwrap();

    let stats = catalog.stats();
    assert_eq!(stats.ambulances_total, 4);
    assert_eq!(stats.hospitals_available, 4);
    assert_eq!(stats.personnel_total, 0);

    let origin = Location::new(40.70, -73.98);
    let ranked = rank(&origin, &catalog.available_ambulances(), None).unwrap();
    let ids: Vec<_> = ranked.iter().map(|r| r.resource.id.as_str()).collect();
    assert_eq!(ids, vec!["A-0", "A-1", "A-2", "A-3"]);
    assert!(ranked[0].distance_km < 0.01);
}

#[tokio::test]
async fn test_readers_never_see_mixed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_generation(dir.path(), "A", 3);
    let catalog = Arc::new(ResourceCatalog::load(dir.path()).unwrap());

    let stop = CancellationToken::new();
    let mut readers = Vec::new();
    for _ in 0..10 {
        let catalog = catalog.clone();
        let stop = stop.clone();
        readers.push(tokio::spawn(async move {
            let mut reads = 0usize;
            while !stop.is_cancelled() {
                let snapshot = catalog.snapshot();
                let ambulances = snapshot.available_ambulances();
                let hospitals = snapshot.available_hospitals();
                let amb_prefix = ambulances[0].id.split('-').next().map(str::to_string);
                let hosp_prefix = hospitals[0].id.split('-').next().map(str::to_string);
                assert_eq!(amb_prefix, hosp_prefix, "mixed generations in one snapshot");
                assert!(ambulances
                    .iter()
                    .all(|a| a.id.split('-').next() == amb_prefix.as_deref()));
                reads += 1;
                tokio::task::yield_now().await;
            }
            reads
        }));
    }

    for (generation, prefix) in ["B", "C", "D", "E"].iter().enumerate() {
        write_generation(dir.path(), prefix, 3 + generation);
        let reloader = catalog.clone();
        let stats = tokio::task::spawn_blocking(move || reloader.reload())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.generation, generation as u64 + 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stop.cancel();

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(catalog.stats().ambulances_total, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reloads_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    write_generation(dir.path(), "A", 3);
    let catalog = Arc::new(ResourceCatalog::load(dir.path()).unwrap());

    let reloads: Vec<_> = (0..8)
        .map(|_| {
            let catalog = catalog.clone();
            tokio::task::spawn_blocking(move || catalog.reload())
        })
        .collect();

    let mut generations = Vec::new();
    for reload in reloads {
        generations.push(reload.await.unwrap().unwrap().generation);
    }
    generations.sort_unstable();
    assert_eq!(generations, (1..=8).collect::<Vec<u64>>());
    assert_eq!(catalog.snapshot().generation(), 8);
}

#[tokio::test]
async fn test_watcher_keeps_snapshot_on_bad_write() {
    let dir = tempfile::tempdir().unwrap();
    write_generation(dir.path(), "A", 2);
    let catalog = Arc::new(ResourceCatalog::load(dir.path()).unwrap());

    let (tx, mut rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(run_catalog_watcher(
        catalog.clone(),
        Duration::from_millis(50),
        tx,
        cancel.clone(),
    ));

    // mtime granularity on some filesystems is one second
    tokio::time::sleep(Duration::from_millis(1100)).await;
    std::fs::write(dir.path().join("hospitals.json"), "{ truncated").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, CatalogEvent::Error(_)));
    assert_eq!(catalog.stats().hospitals_total, 2);
    assert_eq!(catalog.snapshot().generation(), 0);

    cancel.cancel();
    watcher.await.unwrap();
}
