//! Audit trail for incident runs
//!
//! An [`AuditSink`] is built once at start-up and handed to the pipeline.
//! Each run binds it to the incident through an [`AuditContext`] and records
//! one entry per step or error. Sinks never fail the run: write problems are
//! logged and dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::types::StageKind;

pub const AUDIT_FILE: &str = "audit.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Step,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub incident_id: Uuid,
    pub level: AuditLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,
    pub message: String,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Emits entries as `tracing` events on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        let stage = entry.stage.map(|s| s.to_string()).unwrap_or_default();
        match entry.level {
            AuditLevel::Step => tracing::info!(
                target: "audit",
                incident_id = %entry.incident_id,
                stage = %stage,
                "{}",
                entry.message
            ),
            AuditLevel::Error => tracing::error!(
                target: "audit",
                incident_id = %entry.incident_id,
                stage = %stage,
                "{}",
                entry.message
            ),
        }
    }
}

/// Appends one JSON object per line to `<dir>/audit.jsonl`.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    pub fn open(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(AUDIT_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, entry: &AuditEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize audit entry");
                return;
            }
        };
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit entry");
        }
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn for_incident(&self, incident_id: Uuid) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.incident_id == incident_id)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

/// Writes to several sinks.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, entry: &AuditEntry) {
        for sink in &self.sinks {
            sink.record(entry);
        }
    }
}

/// Build the configured sink: tracing always, plus JSONL when a log dir is set.
///
/// A log dir that cannot be opened is reported and skipped.
pub fn create_audit_sink(log_dir: Option<&Path>) -> Arc<dyn AuditSink> {
    let Some(dir) = log_dir else {
        return Arc::new(TracingAuditSink);
    };
    match JsonlAuditSink::open(dir) {
        Ok(jsonl) => {
            tracing::info!(path = %jsonl.path().display(), "Audit log enabled");
            Arc::new(FanoutAuditSink::new(vec![
                Arc::new(TracingAuditSink),
                Arc::new(jsonl),
            ]))
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot open audit log, using tracing only");
            Arc::new(TracingAuditSink)
        }
    }
}

/// Audit handle bound to a single incident.
#[derive(Clone)]
pub struct AuditContext {
    incident_id: Uuid,
    sink: Arc<dyn AuditSink>,
}

impl AuditContext {
    pub fn new(incident_id: Uuid, sink: Arc<dyn AuditSink>) -> Self {
        Self { incident_id, sink }
    }

    pub fn incident_id(&self) -> Uuid {
        self.incident_id
    }

    pub fn log_step(&self, stage: Option<StageKind>, message: impl Into<String>) {
        self.record(AuditLevel::Step, stage, message.into());
    }

    pub fn log_error(&self, stage: Option<StageKind>, message: impl Into<String>) {
        self.record(AuditLevel::Error, stage, message.into());
    }

    fn record(&self, level: AuditLevel, stage: Option<StageKind>, message: String) {
        self.sink.record(&AuditEntry {
            timestamp: Utc::now(),
            incident_id: self.incident_id,
            level,
            stage,
            message,
        });
    }
}
