//! Pipeline Coordinator: runs the three advisory stages for one incident

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{PipelineError, ValidationError};
use crate::agents::{
    MedicalGuidanceStage, ResourceAllocationStage, SeverityAssessmentStage, Stage, StageContext,
    StageError, StageOutput,
};
use crate::audit::{AuditContext, AuditSink, TracingAuditSink};
use crate::catalog::ResourceCatalog;
use crate::config::SystemConfig;
use crate::geo::MapsProvider;
use crate::llm::LlmBackend;
use crate::types::{
    DecisionBundle, Incident, IncidentError, MedicalGuidance, ResourceAllocation, SeverityAnalysis,
    StageKind, TimelineEntry,
};

pub const REPORTED_ACTION: &str = "Emergency reported";

/// Sequences Severity Assessment, Resource Allocation and Medical Guidance.
///
/// Holds no per-incident state, so one pipeline serves concurrent runs.
pub struct IncidentPipeline {
    stages: [Stage; 3],
    stage_timeout: Option<Duration>,
    audit: Arc<dyn AuditSink>,
}

impl IncidentPipeline {
    pub fn new(
        severity: SeverityAssessmentStage,
        allocation: ResourceAllocationStage,
        guidance: MedicalGuidanceStage,
    ) -> Self {
        Self {
            stages: [
                Stage::Severity(severity),
                Stage::Allocation(allocation),
                Stage::Guidance(guidance),
            ],
            stage_timeout: None,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Wire the standard stages from configuration.
    pub fn from_config(
        config: &SystemConfig,
        backend: Arc<dyn LlmBackend>,
        catalog: Arc<ResourceCatalog>,
        maps: Arc<dyn MapsProvider>,
    ) -> Self {
        let severity = SeverityAssessmentStage::new(backend.clone());
        let allocation =
            ResourceAllocationStage::new(backend.clone(), catalog, maps, config.allocation.clone())
                .with_search_radius(config.maps.search_radius_m);
        let guidance = MedicalGuidanceStage::new(backend);
        Self::new(severity, allocation, guidance).with_stage_timeout(config.pipeline.stage_timeout())
    }

    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn stage_kinds(&self) -> [StageKind; 3] {
        [self.stages[0].kind(), self.stages[1].kind(), self.stages[2].kind()]
    }

    pub async fn run(&self, incident: &mut Incident) -> Result<DecisionBundle, PipelineError> {
        self.run_with_cancel(incident, &CancellationToken::new()).await
    }

    /// Run all stages, stopping at the next stage boundary once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        incident: &mut Incident,
        cancel: &CancellationToken,
    ) -> Result<DecisionBundle, PipelineError> {
        validate(incident)?;

        let audit = AuditContext::new(incident.id, self.audit.clone());
        let run_started = Instant::now();
        let mut timeline = vec![TimelineEntry::now(REPORTED_ACTION)];
        audit.log_step(None, REPORTED_ACTION);

        let mut severity: Option<SeverityAnalysis> = None;
        let mut allocation: Option<ResourceAllocation> = None;
        let mut guidance: Option<MedicalGuidance> = None;

        for stage in &self.stages {
            let kind = stage.kind();
            if cancel.is_cancelled() {
                warn!(incident_id = %incident.id, stage = %kind, "Run cancelled at stage boundary");
                let action = format!("{} cancelled", kind.label());
                audit.log_error(Some(kind), action.clone());
                timeline.push(TimelineEntry::now(action));
                return Err(PipelineError::Cancelled {
                    stage: kind,
                    timeline,
                });
            }

            let ctx = StageContext {
                incident: &*incident,
                severity_analysis: severity.as_ref(),
                resource_allocation: allocation.as_ref(),
            };
            let started = Instant::now();
            let result = match self.stage_timeout {
                Some(limit) => tokio::time::timeout(limit, stage.process(&ctx))
                    .await
                    .unwrap_or(Err(StageError::Timeout(limit))),
                None => stage.process(&ctx).await,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    error!(
                        incident_id = %incident.id,
                        stage = %kind,
                        elapsed_ms,
                        error = %e,
                        "Stage failed"
                    );
                    let action = format!("{} failed", kind.label());
                    audit.log_error(Some(kind), format!("{action}: {e}"));
                    timeline.push(TimelineEntry::now(action));
                    return Err(PipelineError::StageFailure {
                        stage: kind,
                        source: e,
                        timeline,
                    });
                }
            };

            info!(incident_id = %incident.id, stage = %kind, elapsed_ms, "Stage completed");
            let action = format!("{} completed", kind.label());
            audit.log_step(Some(kind), action.clone());
            timeline.push(TimelineEntry::now(action));

            match output {
                StageOutput::Severity(analysis) => severity = Some(analysis),
                StageOutput::Allocation(a) => allocation = Some(a),
                StageOutput::Guidance(g) => guidance = Some(g),
            }
        }

        let (Some(severity_analysis), Some(resource_allocation), Some(medical_guidance)) =
            (severity, allocation, guidance)
        else {
            return Err(PipelineError::StageFailure {
                stage: StageKind::MedicalGuidance,
                source: StageError::MissingInput(StageKind::MedicalGuidance),
                timeline,
            });
        };

        // Only a complete run marks the incident assessed; failed runs stay retryable.
        incident
            .assign_severity(severity_analysis.severity_level)
            .map_err(ValidationError::from)?;

        info!(
            incident_id = %incident.id,
            severity = severity_analysis.severity_level,
            ambulances = resource_allocation.recommended_resources.ambulances.len(),
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "Decision bundle assembled"
        );

        Ok(DecisionBundle {
            severity_analysis,
            resource_allocation,
            medical_guidance,
            timeline,
        })
    }
}

fn validate(incident: &Incident) -> Result<(), ValidationError> {
    incident.location.validate()?;
    if incident.chief_complaint.trim().is_empty() {
        return Err(ValidationError::EmptyComplaint);
    }
    if let Some(current) = incident.severity_level() {
        return Err(IncidentError::SeverityAlreadyAssigned {
            id: incident.id,
            current,
        }
        .into());
    }
    Ok(())
}
