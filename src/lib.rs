//! Emergency Response Coordinator
//!
//! LLM-assisted decision support for emergency medical incidents.
//!
//! ## Architecture
//!
//! - **Incident Pipeline**: runs Severity Assessment, Resource Allocation and
//!   Medical Guidance in order and assembles a [`DecisionBundle`]
//! - **Resource Catalog**: lock-free snapshot of ambulances, hospitals and
//!   personnel, reloadable at runtime
//! - **Proximity Ranker**: great-circle ranking of candidates nearest-first
//! - **LLM Module**: the external reasoning call behind [`llm::LlmBackend`]
//! - **Report / Notify / Audit**: what happens around a finished run

pub mod agents;
pub mod api;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod geo;
pub mod llm;
pub mod notify;
pub mod parsing;
pub mod pipeline;
pub mod report;
pub mod triage;
pub mod types;

pub use catalog::{CatalogSnapshot, CatalogStats, ResourceCatalog};
pub use config::SystemConfig;
pub use pipeline::{IncidentPipeline, PipelineError, ValidationError};
pub use types::{
    DecisionBundle, Incident, Location, RankedResource, Resource, ResourceStatus, StageKind,
    VitalSigns,
};
