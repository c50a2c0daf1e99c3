//! Shared data structures for incident coordination
//!
//! - Incident intake: Location, VitalSigns, Incident
//! - Resource catalog entries: Resource, ResourceStatus, RankedResource
//! - Advisory stage outputs: SeverityAnalysis, ResourceAllocation, MedicalGuidance
//! - Terminal artifact: DecisionBundle with its timeline

mod advisory;
mod incident;
mod resource;

pub use advisory::*;
pub use incident::*;
pub use resource::*;
