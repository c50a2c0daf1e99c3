//! Resource Catalog
//!
//! Read-only view over the ambulance, hospital and personnel datasets.
//!
//! ## Snapshot model
//!
//! The loaded datasets live in one immutable [`CatalogSnapshot`] held in an
//! [`ArcSwap`]. Readers take the current snapshot without locking; `reload()`
//! builds a complete new snapshot off to the side and swaps it in with one
//! atomic store. A reader therefore sees either the old catalog or the new
//! one, never a mix. Reloads are serialized by a mutex that readers never
//! touch.
//!
//! Callers that need several consistent queries (e.g. ambulances and
//! hospitals for one allocation) should call [`ResourceCatalog::snapshot`]
//! once and query the returned snapshot.

pub mod loader;
pub mod watcher;

pub use watcher::{run_catalog_watcher, CatalogEvent};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::defaults;
use crate::types::{CapacityRecord, Resource, ResourceKind};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("dataset I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("dataset parse error ({0}): {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("dataset shape error ({path}): {message}")]
    Shape { path: PathBuf, message: String },
    #[error("catalog has no data directory to reload from")]
    NoDataDir,
}

/// Counts of loaded and available resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub ambulances_total: usize,
    pub ambulances_available: usize,
    pub hospitals_total: usize,
    pub hospitals_available: usize,
    pub personnel_total: usize,
    pub personnel_available: usize,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// One immutable, fully loaded version of the datasets.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    ambulances: Vec<Resource>,
    hospitals: Vec<Resource>,
    personnel: Vec<Resource>,
    loaded_at: DateTime<Utc>,
    generation: u64,
}

impl CatalogSnapshot {
    pub fn new(ambulances: Vec<Resource>, hospitals: Vec<Resource>, personnel: Vec<Resource>) -> Self {
        Self {
            ambulances,
            hospitals,
            personnel,
            loaded_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    /// Load all three datasets from `dir`.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        Ok(Self::new(
            loader::load_ambulances(&dir.join(defaults::AMBULANCES_FILE))?,
            loader::load_hospitals(&dir.join(defaults::HOSPITALS_FILE))?,
            loader::load_personnel(&dir.join(defaults::PERSONNEL_FILE))?,
        ))
    }

    pub fn available_ambulances(&self) -> Vec<Resource> {
        available(&self.ambulances)
    }

    pub fn available_hospitals(&self) -> Vec<Resource> {
        available(&self.hospitals)
    }

    pub fn available_personnel(&self) -> Vec<Resource> {
        available(&self.personnel)
    }

    /// Emergency department capacity of a hospital, regardless of its status.
    pub fn hospital_capacity(&self, hospital_id: &str) -> Option<CapacityRecord> {
        self.hospitals
            .iter()
            .find(|h| h.id == hospital_id)
            .and_then(|h| h.capacity().cloned())
    }

    pub fn all(&self, kind: ResourceKind) -> &[Resource] {
        match kind {
            ResourceKind::Ambulance => &self.ambulances,
            ResourceKind::Hospital => &self.hospitals,
            ResourceKind::Personnel => &self.personnel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn stats(&self) -> CatalogStats {
        let count = |items: &[Resource]| items.iter().filter(|r| r.is_available()).count();
        CatalogStats {
            ambulances_total: self.ambulances.len(),
            ambulances_available: count(&self.ambulances),
            hospitals_total: self.hospitals.len(),
            hospitals_available: count(&self.hospitals),
            personnel_total: self.personnel.len(),
            personnel_available: count(&self.personnel),
            generation: self.generation,
            loaded_at: self.loaded_at,
        }
    }
}

fn available(items: &[Resource]) -> Vec<Resource> {
    items.iter().filter(|r| r.is_available()).cloned().collect()
}

// ============================================================================
// Catalog
// ============================================================================

pub struct ResourceCatalog {
    data_dir: Option<PathBuf>,
    current: ArcSwap<CatalogSnapshot>,
    reload_lock: Mutex<()>,
}

impl ResourceCatalog {
    /// Load the catalog from a data directory.
    ///
    /// Missing dataset files yield empty collections; malformed files fail.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.into();
        let snapshot = CatalogSnapshot::load(&data_dir)?;
        let stats = snapshot.stats();
        info!(
            dir = %data_dir.display(),
            ambulances = stats.ambulances_total,
            hospitals = stats.hospitals_total,
            personnel = stats.personnel_total,
            "Resource catalog loaded"
        );
        Ok(Self {
            data_dir: Some(data_dir),
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    /// In-memory catalog with no backing directory (tests, simulations).
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            data_dir: None,
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn empty() -> Self {
        Self::from_snapshot(CatalogSnapshot::empty())
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Current snapshot. Cheap; hold it for a consistent multi-query read.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }

    pub fn available_ambulances(&self) -> Vec<Resource> {
        self.current.load().available_ambulances()
    }

    pub fn available_hospitals(&self) -> Vec<Resource> {
        self.current.load().available_hospitals()
    }

    pub fn available_personnel(&self) -> Vec<Resource> {
        self.current.load().available_personnel()
    }

    pub fn hospital_capacity(&self, hospital_id: &str) -> Option<CapacityRecord> {
        self.current.load().hospital_capacity(hospital_id)
    }

    pub fn stats(&self) -> CatalogStats {
        self.current.load().stats()
    }

    /// Re-read every dataset and atomically replace the snapshot.
    ///
    /// On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<CatalogStats, CatalogError> {
        let dir = self.data_dir.as_deref().ok_or(CatalogError::NoDataDir)?;
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match CatalogSnapshot::load(dir) {
            Ok(snapshot) => Ok(self.install(snapshot)),
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Catalog reload failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Swap in an externally built snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) -> CatalogStats {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.install(snapshot)
    }

    // Caller holds reload_lock
    fn install(&self, mut snapshot: CatalogSnapshot) -> CatalogStats {
        snapshot.generation = self.current.load().generation + 1;
        let stats = snapshot.stats();
        self.current.store(Arc::new(snapshot));
        info!(
            generation = stats.generation,
            ambulances = stats.ambulances_total,
            hospitals = stats.hospitals_total,
            personnel = stats.personnel_total,
            "Resource catalog replaced"
        );
        stats
    }
}

impl std::fmt::Debug for ResourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCatalog")
            .field("data_dir", &self.data_dir)
            .field("generation", &self.current.load().generation)
            .finish()
    }
}
