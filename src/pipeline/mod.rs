//! Incident Pipeline
//!
//! ## Sequence
//!
//! ```text
//! validate incident        (no stage runs if this fails)
//!   -> Severity Assessment  (assigns incident severity)
//!   -> Resource Allocation  (ranks catalog candidates)
//!   -> Medical Guidance
//!   -> DecisionBundle
//! ```
//!
//! Stages run strictly one after another and each sees every earlier output.
//! The first failure ends the run with no bundle. There is no retry.
//! Cancellation is observed between stages only.

mod coordinator;
mod error;

pub use coordinator::IncidentPipeline;
pub use error::{PipelineError, ValidationError};
