//! Advisory stages for incident coordination
//!
//! Each stage reads the accumulated [`StageContext`], makes one external
//! reasoning call, and returns a structured partial result.
//!
//! ## Stages (run in this order)
//!
//! 1. **Severity Assessment**: severity level and medical considerations
//! 2. **Resource Allocation**: ambulances, destination hospital, extra resources
//! 3. **Medical Guidance**: interventions, transport, hospital preparation, protocols
//!
//! Stages implement [`AdvisoryStage`]; the pipeline holds them through the
//! [`Stage`] enum so the set of variants stays closed and ordered.
//!
//! A failed reasoning call is a [`StageError`]. A response that cannot be
//! parsed is not: parsers degrade to defaults.

pub mod allocation;
pub mod guidance;
pub mod severity;

pub use allocation::ResourceAllocationStage;
pub use guidance::MedicalGuidanceStage;
pub use severity::SeverityAssessmentStage;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::{GeoError, MapsError};
use crate::types::{Incident, MedicalGuidance, ResourceAllocation, SeverityAnalysis, StageKind};

/// Persona line each stage opens its prompt with.
pub const SEVERITY_PERSONA: &str = "You are an Emergency Detection Specialist with years of experience in triage and emergency response.";
pub const ALLOCATION_PERSONA: &str = "You are a Resource Coordinator experienced in dispatching ambulances and matching patients to receiving hospitals.";
pub const GUIDANCE_PERSONA: &str = "You are a Medical Advisor, a senior emergency medicine physician who gives concise field guidance.";

#[derive(Debug, Error)]
pub enum StageError {
    #[error("reasoning call failed: {0}")]
    Reasoning(String),

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("mapping lookup failed: {0}")]
    Maps(#[from] MapsError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("required output of {0} is missing")]
    MissingInput(StageKind),
}

impl StageError {
    /// Short, non-sensitive description suitable for API responses.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Reasoning(_) => "reasoning service unavailable",
            Self::Timeout(_) => "reasoning service timed out",
            Self::Maps(_) => "mapping service unavailable",
            Self::Geo(_) => "invalid resource location",
            Self::MissingInput(_) => "internal sequencing error",
        }
    }
}

/// Everything a stage may read: the incident plus every earlier stage output.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub incident: &'a Incident,
    pub severity_analysis: Option<&'a SeverityAnalysis>,
    pub resource_allocation: Option<&'a ResourceAllocation>,
}

impl<'a> StageContext<'a> {
    pub fn new(incident: &'a Incident) -> Self {
        Self {
            incident,
            severity_analysis: None,
            resource_allocation: None,
        }
    }

    pub fn require_severity(&self) -> Result<&'a SeverityAnalysis, StageError> {
        self.severity_analysis
            .ok_or(StageError::MissingInput(StageKind::SeverityAssessment))
    }

    pub fn require_allocation(&self) -> Result<&'a ResourceAllocation, StageError> {
        self.resource_allocation
            .ok_or(StageError::MissingInput(StageKind::ResourceAllocation))
    }
}

/// Partial result produced by one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Severity(SeverityAnalysis),
    Allocation(ResourceAllocation),
    Guidance(MedicalGuidance),
}

impl StageOutput {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Severity(_) => StageKind::SeverityAssessment,
            Self::Allocation(_) => StageKind::ResourceAllocation,
            Self::Guidance(_) => StageKind::MedicalGuidance,
        }
    }
}

/// Capability shared by the three advisory stages.
#[async_trait]
pub trait AdvisoryStage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn process(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError>;
}

/// Closed set of stage variants.
pub enum Stage {
    Severity(SeverityAssessmentStage),
    Allocation(ResourceAllocationStage),
    Guidance(MedicalGuidanceStage),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        self.as_dyn().kind()
    }

    pub async fn process(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        self.as_dyn().process(ctx).await
    }

    fn as_dyn(&self) -> &dyn AdvisoryStage {
        match self {
            Self::Severity(s) => s,
            Self::Allocation(s) => s,
            Self::Guidance(s) => s,
        }
    }
}

/// Run the reasoning call and map any backend error to [`StageError::Reasoning`].
pub(crate) async fn reason(
    backend: &dyn crate::llm::LlmBackend,
    kind: StageKind,
    prompt: &str,
) -> Result<String, StageError> {
    tracing::debug!(stage = %kind, backend = backend.backend_name(), "Invoking reasoning call");
    backend
        .generate(prompt)
        .await
        .map_err(|e| StageError::Reasoning(format!("{e:#}")))
}
