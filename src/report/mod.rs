//! Text report rendering
//!
//! One plain-text file per incident, named
//! `emergency_report_<YYYYmmdd_HHMMSS>_<id8>.txt`, with the sections
//! INCIDENT DETAILS, EMERGENCY ANALYSIS, RESOURCE ALLOCATION,
//! MEDICAL GUIDANCE and RESPONSE TIMELINE.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::types::{DecisionBundle, Incident};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {0}: {1}")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("failed to write report {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
}

pub fn report_file_name(incident: &Incident, at: DateTime<Utc>) -> String {
    format!(
        "emergency_report_{}_{}.txt",
        at.format("%Y%m%d_%H%M%S"),
        incident.short_id()
    )
}

#[derive(Debug, Clone)]
pub struct TextReportWriter {
    dir: PathBuf,
}

impl TextReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render and write the report, returning its path.
    pub async fn write(
        &self,
        incident: &Incident,
        bundle: &DecisionBundle,
    ) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ReportError::CreateDir(self.dir.clone(), e))?;

        let now = Utc::now();
        let path = self.dir.join(report_file_name(incident, now));
        let text = render(incident, bundle, now);
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| ReportError::Write(path.clone(), e))?;

        info!(incident_id = %incident.id, path = %path.display(), "Report written");
        Ok(path)
    }
}

/// Line-oriented text buffer for the report body.
#[derive(Default)]
struct ReportText(String);

impl ReportText {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }

    fn heading(&mut self, title: &str) {
        self.0.push('\n');
        self.line(title);
        self.line("-".repeat(title.len()));
    }

    fn bullets(&mut self, items: &[String], indent: &str) {
        if items.is_empty() {
            self.line(format!("{indent}- none"));
        }
        for item in items {
            self.line(format!("{indent}- {item}"));
        }
    }
}

pub fn render(incident: &Incident, bundle: &DecisionBundle, generated_at: DateTime<Utc>) -> String {
    let severity = &bundle.severity_analysis;
    let allocation = &bundle.resource_allocation;
    let resources = &allocation.recommended_resources;
    let guidance = &bundle.medical_guidance;

    let mut out = ReportText::default();
    out.line("EMERGENCY RESPONSE REPORT");
    out.line("=========================");
    out.line(format!("Incident ID: {}", incident.id));
    out.line(format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")));

    out.heading("INCIDENT DETAILS");
    out.line(format!("Reported: {}", incident.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
    out.line(format!(
        "Location: {} ({:.5}, {:.5})",
        incident.location.display_name(),
        incident.location.latitude,
        incident.location.longitude
    ));
    if let Some(address) = &allocation.incident_address {
        out.line(format!("Address: {address}"));
    }
    out.line(format!(
        "Patient: {} year old {}",
        incident.patient_age, incident.patient_gender
    ));
    out.line(format!("Chief Complaint: {}", incident.chief_complaint));
    out.line(format!("Vital Signs: {}", incident.vitals));

    out.heading("EMERGENCY ANALYSIS");
    out.line(format!("Severity Level: {}/10", severity.severity_level));
    out.line("Medical Considerations:");
    out.bullets(&severity.medical_considerations, "  ");

    out.heading("RESOURCE ALLOCATION");
    out.line("Ambulances:");
    if resources.ambulances.is_empty() {
        out.line("  - none available");
    }
    for a in &resources.ambulances {
        out.line(format!("  - {a}"));
    }
    match &resources.hospital {
        Some(h) => out.line(format!("Receiving Hospital: {h}")),
        None => out.line("Receiving Hospital: none identified"),
    }
    out.line("Additional Resources:");
    out.bullets(&resources.additional_resources, "  ");

    out.heading("MEDICAL GUIDANCE");
    out.line("Immediate Interventions:");
    if guidance.immediate_interventions.is_empty() {
        out.line("  - none");
    }
    for (i, item) in guidance.immediate_interventions.iter().enumerate() {
        out.line(format!("  {}. {item}", i + 1));
    }
    let transport = &guidance.transport_guidelines;
    out.line("Transport:");
    out.line(format!(
        "  Positioning: {}",
        transport.positioning.as_deref().unwrap_or("not specified")
    ));
    out.line("  Monitoring:");
    out.bullets(&transport.monitoring, "    ");
    out.line("  Precautions:");
    out.bullets(&transport.precautions, "    ");
    let prep = &guidance.hospital_preparations;
    out.line("Hospital Preparations:");
    out.line("  Immediate Needs:");
    out.bullets(&prep.immediate_needs, "    ");
    out.line("  Specialists:");
    out.bullets(&prep.specialist_requirements, "    ");
    out.line("  Equipment:");
    out.bullets(&prep.equipment_preparation, "    ");
    out.line("Protocols:");
    if guidance.medical_protocols.is_empty() {
        out.line("  - none");
    }
    for protocol in &guidance.medical_protocols {
        out.line(format!("  {}:", protocol.name));
        out.bullets(&protocol.steps, "    ");
    }

    out.heading("RESPONSE TIMELINE");
    for entry in &bundle.timeline {
        out.line(format!("{}  {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.action));
    }
    out.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{
        CapacityRecord, HospitalPreparations, Location, MedicalGuidance, MedicalProtocol,
        RankedResource, RecommendedResources, Resource, ResourceAllocation, ResourceDetails,
        ResourceStatus, SeverityAnalysis, TimelineEntry, TransportGuidelines, VitalSigns,
    };

    pub(crate) fn sample() -> (Incident, DecisionBundle) {
        let incident = Incident::create(
            Location::new(40.7484, -73.9857).with_description("Empire State Building"),
            58,
            "male",
            "chest pain",
            VitalSigns {
                heart_rate: 132,
                blood_pressure_systolic: 165,
                blood_pressure_diastolic: 98,
                spo2: 89,
                respiratory_rate: 24,
            },
        );
        let ambulance = Resource {
            id: "AMB-007".into(),
            name: Some("Medic 7".into()),
            location: Location::new(40.75, -73.99),
            status: ResourceStatus::Available,
            details: ResourceDetails::Ambulance {
                unit_type: "ALS".into(),
                crew_size: Some(2),
                equipment: Vec::new(),
            },
        };
        let hospital = Resource {
            id: "HOSP-2".into(),
            name: Some("Bellevue Hospital".into()),
            location: Location::new(40.7392, -73.9754),
            status: ResourceStatus::Available,
            details: ResourceDetails::Hospital {
                capacity: Some(CapacityRecord {
                    total_beds: 40,
                    available_beds: 6,
                    ..Default::default()
                }),
                specialties: vec!["cardiology".into()],
                trauma_level: Some(1),
            },
        };
        let bundle = DecisionBundle {
            severity_analysis: SeverityAnalysis {
                severity_level: 9,
                medical_considerations: vec!["Suspected STEMI".into()],
                raw_analysis: "Severity Level: 9".into(),
            },
            resource_allocation: ResourceAllocation {
                recommended_resources: RecommendedResources {
                    ambulances: vec![RankedResource { resource: ambulance, distance_km: 0.4 }],
                    hospital: Some(RankedResource { resource: hospital, distance_km: 1.3 }),
                    additional_resources: vec!["Fire department first responders".into()],
                },
                incident_address: Some("350 5th Ave, New York, NY 10118".into()),
                raw_allocation_plan: String::new(),
            },
            medical_guidance: MedicalGuidance {
                immediate_interventions: vec!["Administer aspirin".into(), "12-lead ECG".into()],
                transport_guidelines: TransportGuidelines {
                    positioning: Some("semi-recumbent".into()),
                    monitoring: vec!["Continuous ECG".into()],
                    precautions: Vec::new(),
                },
                hospital_preparations: HospitalPreparations {
                    immediate_needs: vec!["Activate cath lab".into()],
                    ..Default::default()
                },
                medical_protocols: vec![MedicalProtocol {
                    name: "ACS".into(),
                    steps: vec!["Serial ECGs".into()],
                }],
                raw_guidance: String::new(),
            },
            timeline: vec![
                TimelineEntry::now("Emergency reported"),
                TimelineEntry::now("Severity assessment completed"),
            ],
        };
        (incident, bundle)
    }

    #[test]
    fn test_file_name_format() {
        let (incident, _) = sample();
        let at = DateTime::parse_from_rfc3339("2024-03-05T14:07:09Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = report_file_name(&incident, at);
        assert_eq!(name, format!("emergency_report_20240305_140709_{}.txt", incident.short_id()));
    }

    #[test]
    fn test_render_sections_in_order() {
        let (incident, bundle) = sample();
        let text = render(&incident, &bundle, Utc::now());
        let positions: Vec<usize> = [
            "INCIDENT DETAILS",
            "EMERGENCY ANALYSIS",
            "RESOURCE ALLOCATION",
            "MEDICAL GUIDANCE",
            "RESPONSE TIMELINE",
        ]
        .iter()
        .map(|s| text.find(s).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("Severity Level: 9/10"));
        assert!(text.contains("Address: 350 5th Ave"));
        assert!(text.contains("Medic 7 (AMB-007)"));
        assert!(text.contains("  1. Administer aspirin"));
        assert!(text.contains("  ACS:\n    - Serial ECGs"));
        assert!(text.contains("Severity assessment completed"));
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TextReportWriter::new(dir.path().join("reports"));
        let (incident, bundle) = sample();
        let path = writer.write(&incident, &bundle).await.unwrap();

        assert!(path.starts_with(dir.path().join("reports")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("emergency_report_"));
        assert!(name.ends_with(&format!("_{}.txt", incident.short_id())));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("EMERGENCY RESPONSE REPORT"));
    }
}
