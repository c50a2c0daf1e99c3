//! Severity Assessment stage

use std::sync::Arc;

use async_trait::async_trait;

use super::{reason, AdvisoryStage, StageContext, StageError, StageOutput, SEVERITY_PERSONA};
use crate::llm::LlmBackend;
use crate::parsing::{HeuristicSeverityParser, JsonFirst, ResponseParser, SeverityFindings};
use crate::types::{Incident, SeverityAnalysis, StageKind};

type SeverityParser = Box<dyn ResponseParser<Output = SeverityFindings>>;

pub struct SeverityAssessmentStage {
    backend: Arc<dyn LlmBackend>,
    parser: SeverityParser,
}

impl SeverityAssessmentStage {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            parser: Box::new(JsonFirst::new(HeuristicSeverityParser)),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: SeverityParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn build_prompt(incident: &Incident) -> String {
        let v = &incident.vitals;
        format!(
            "{SEVERITY_PERSONA}

Analyze the following emergency situation:
- Patient Age: {age}
- Patient Gender: {gender}
- Symptoms: {complaint}
- Vital Signs:
  * Heart Rate: {hr} bpm
  * Blood Pressure: {sys}/{dia} mmHg
  * SpO2: {spo2}%
  * Respiratory Rate: {rr}/min

Respond with:
Severity Level: <1-10>
Medical Considerations:
- <one consideration per line>
",
            age = incident.patient_age,
            gender = incident.patient_gender,
            complaint = incident.chief_complaint,
            hr = v.heart_rate,
            sys = v.blood_pressure_systolic,
            dia = v.blood_pressure_diastolic,
            spo2 = v.spo2,
            rr = v.respiratory_rate,
        )
    }
}

#[async_trait]
impl AdvisoryStage for SeverityAssessmentStage {
    fn kind(&self) -> StageKind {
        StageKind::SeverityAssessment
    }

    async fn process(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let prompt = Self::build_prompt(ctx.incident);
        let response = reason(self.backend.as_ref(), self.kind(), &prompt).await?;
        let findings = self.parser.parse(&response);

        tracing::debug!(
            incident_id = %ctx.incident.id,
            severity = findings.severity_level,
            considerations = findings.medical_considerations.len(),
            parser = self.parser.name(),
            "Severity response parsed"
        );

        Ok(StageOutput::Severity(SeverityAnalysis {
            severity_level: findings.severity_level,
            medical_considerations: findings.medical_considerations,
            raw_analysis: response,
        }))
    }
}
