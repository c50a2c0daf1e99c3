//! Medical Guidance stage
//!
//! Reads the incident, the severity analysis and the allocated resources, and
//! asks for field interventions, transport guidance, receiving-hospital
//! preparation and applicable protocols.

use std::sync::Arc;

use async_trait::async_trait;

use super::{reason, AdvisoryStage, StageContext, StageError, StageOutput, GUIDANCE_PERSONA};
use crate::llm::LlmBackend;
use crate::parsing::{GuidanceFindings, HeuristicGuidanceParser, JsonFirst, ResponseParser};
use crate::types::{Incident, MedicalGuidance, ResourceAllocation, SeverityAnalysis, StageKind};

type GuidanceParser = Box<dyn ResponseParser<Output = GuidanceFindings>>;

pub struct MedicalGuidanceStage {
    backend: Arc<dyn LlmBackend>,
    parser: GuidanceParser,
}

impl MedicalGuidanceStage {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            parser: Box::new(JsonFirst::new(HeuristicGuidanceParser)),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: GuidanceParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn build_prompt(
        incident: &Incident,
        severity: &SeverityAnalysis,
        allocation: &ResourceAllocation,
    ) -> String {
        let resources = &allocation.recommended_resources;
        let considerations = if severity.medical_considerations.is_empty() {
            String::new()
        } else {
            format!(
                "Medical Considerations: {}\n",
                severity.medical_considerations.join("; ")
            )
        };
        let units: Vec<&str> = resources
            .ambulances
            .iter()
            .map(|a| a.resource.unit_type().unwrap_or("unspecified"))
            .collect();
        let units = if units.is_empty() {
            "none available".to_string()
        } else {
            units.join(", ")
        };
        let hospital = resources
            .hospital
            .as_ref()
            .map_or("not yet determined", |h| h.resource.label());

        format!(
            "{GUIDANCE_PERSONA}

Provide medical guidance for:
Severity Level: {level}
{considerations}Patient: {age} year old {gender}
Chief Complaint: {complaint}
Vitals: {vitals}
Responding Units: {units}
Destination Hospital: {hospital}

Respond with these sections:
Immediate Interventions: numbered list
Transport Considerations: position, what to monitor, cautions
Hospital Preparation: needs, specialists, equipment
Protocols: each protocol name ending with a colon, then its steps
",
            level = severity.severity_level,
            age = incident.patient_age,
            gender = incident.patient_gender,
            complaint = incident.chief_complaint,
            vitals = incident.vitals,
        )
    }
}

#[async_trait]
impl AdvisoryStage for MedicalGuidanceStage {
    fn kind(&self) -> StageKind {
        StageKind::MedicalGuidance
    }

    async fn process(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let severity = ctx.require_severity()?;
        let allocation = ctx.require_allocation()?;

        let prompt = Self::build_prompt(ctx.incident, severity, allocation);
        let response = reason(self.backend.as_ref(), self.kind(), &prompt).await?;
        let findings = self.parser.parse(&response);

        tracing::debug!(
            incident_id = %ctx.incident.id,
            interventions = findings.immediate_interventions.len(),
            protocols = findings.medical_protocols.len(),
            parser = self.parser.name(),
            "Guidance response parsed"
        );

        Ok(StageOutput::Guidance(MedicalGuidance {
            immediate_interventions: findings.immediate_interventions,
            transport_guidelines: findings.transport_guidelines,
            hospital_preparations: findings.hospital_preparations,
            medical_protocols: findings.medical_protocols,
            raw_guidance: response,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FailingBackend, StaticBackend};
    use crate::types::{
        Location, RankedResource, RecommendedResources, Resource, ResourceDetails, ResourceStatus,
        VitalSigns,
    };

    fn incident() -> Incident {
        Incident::create(
            Location::new(40.75, -73.98),
            61,
            "male",
            "chest pain radiating to left arm",
            VitalSigns {
                heart_rate: 124,
                blood_pressure_systolic: 88,
                blood_pressure_diastolic: 60,
                spo2: 91,
                respiratory_rate: 22,
            },
        )
    }

    fn severity() -> SeverityAnalysis {
        SeverityAnalysis {
            severity_level: 9,
            medical_considerations: vec!["Possible STEMI".into(), "Hypotension".into()],
            raw_analysis: String::new(),
        }
    }

    fn allocation() -> ResourceAllocation {
        let ambulance = Resource {
            id: "AMB-001".into(),
            name: None,
            location: Location::new(40.751, -73.981),
            status: ResourceStatus::Available,
            details: ResourceDetails::Ambulance {
                unit_type: "ALS".into(),
                crew_size: Some(2),
                equipment: Vec::new(),
            },
        };
        let hospital = Resource {
            id: "H-1".into(),
            name: Some("Bellevue Hospital".into()),
            location: Location::new(40.739, -73.975),
            status: ResourceStatus::Available,
            details: ResourceDetails::Hospital {
                capacity: None,
                specialties: vec!["cardiology".into()],
                trauma_level: Some(1),
            },
        };
        ResourceAllocation {
            recommended_resources: RecommendedResources {
                ambulances: vec![RankedResource { resource: ambulance, distance_km: 0.14 }],
                hospital: Some(RankedResource { resource: hospital, distance_km: 1.3 }),
                additional_resources: Vec::new(),
            },
            incident_address: None,
            raw_allocation_plan: String::new(),
        }
    }

    const RESPONSE: &str = "\
Immediate Interventions:
1. Administer aspirin 324 mg
2. Establish IV access

Transport Considerations:
Position: supine with legs elevated
Monitor blood pressure every 5 minutes

Hospital Preparation:
Activate cath lab
Cardiology consult on arrival

Protocols:
STEMI:
Door-to-balloon under 90 minutes";

    #[tokio::test]
    async fn test_guidance_stage_parses_sections() {
        let stage = MedicalGuidanceStage::new(Arc::new(StaticBackend::new(RESPONSE)));
        let incident = incident();
        let severity = severity();
        let allocation = allocation();
        let ctx = StageContext {
            incident: &incident,
            severity_analysis: Some(&severity),
            resource_allocation: Some(&allocation),
        };

        let StageOutput::Guidance(guidance) = stage.process(&ctx).await.unwrap() else {
            panic!("wrong output variant");
        };
        assert_eq!(
            guidance.immediate_interventions,
            vec!["Administer aspirin 324 mg", "Establish IV access"]
        );
        assert_eq!(
            guidance.transport_guidelines.positioning.as_deref(),
            Some("supine with legs elevated")
        );
        assert_eq!(guidance.hospital_preparations.immediate_needs, vec!["Activate cath lab"]);
        assert_eq!(guidance.medical_protocols.len(), 1);
        assert_eq!(guidance.medical_protocols[0].name, "STEMI");
        assert_eq!(guidance.raw_guidance, RESPONSE);
    }

    #[tokio::test]
    async fn test_guidance_requires_allocation() {
        let stage = MedicalGuidanceStage::new(Arc::new(StaticBackend::new(RESPONSE)));
        let incident = incident();
        let severity = severity();
        let ctx = StageContext {
            incident: &incident,
            severity_analysis: Some(&severity),
            resource_allocation: None,
        };
        let err = stage.process(&ctx).await.unwrap_err();
        assert!(matches!(err, StageError::MissingInput(StageKind::ResourceAllocation)));
    }

    #[tokio::test]
    async fn test_guidance_call_failure() {
        let stage = MedicalGuidanceStage::new(Arc::new(FailingBackend::new("connection reset")));
        let incident = incident();
        let severity = severity();
        let allocation = allocation();
        let ctx = StageContext {
            incident: &incident,
            severity_analysis: Some(&severity),
            resource_allocation: Some(&allocation),
        };
        let err = stage.process(&ctx).await.unwrap_err();
        assert!(matches!(err, StageError::Reasoning(_)));
    }

    #[test]
    fn test_prompt_includes_upstream_outputs() {
        let prompt = MedicalGuidanceStage::build_prompt(&incident(), &severity(), &allocation());
        assert!(prompt.starts_with(GUIDANCE_PERSONA));
        assert!(prompt.contains("Severity Level: 9"));
        assert!(prompt.contains("Possible STEMI; Hypotension"));
        assert!(prompt.contains("Patient: 61 year old male"));
        assert!(prompt.contains("Responding Units: ALS"));
        assert!(prompt.contains("Destination Hospital: Bellevue Hospital"));
    }
}
