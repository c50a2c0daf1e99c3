//! Medical guidance parsing

use serde::{Deserialize, Serialize};

use super::sections::{contains_any, extract_section, normalize_response, value_after_colon};
use super::ResponseParser;
use crate::types::{HospitalPreparations, MedicalProtocol, TransportGuidelines};

/// Section keywords; a line containing another section's keyword ends a section.
const GUIDANCE_SECTIONS: &[&str] = &["immediate", "transport", "preparation", "protocol"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuidanceFindings {
    pub immediate_interventions: Vec<String>,
    pub transport_guidelines: TransportGuidelines,
    pub hospital_preparations: HospitalPreparations,
    pub medical_protocols: Vec<MedicalProtocol>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGuidanceParser;

impl ResponseParser for HeuristicGuidanceParser {
    type Output = GuidanceFindings;

    fn parse(&self, text: &str) -> GuidanceFindings {
        let text = normalize_response(text);
        GuidanceFindings {
            immediate_interventions: extract_interventions(&text),
            transport_guidelines: extract_transport_guidelines(&text),
            hospital_preparations: extract_hospital_preparations(&text),
            medical_protocols: extract_protocols(&text),
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Numbered lines under the "immediate interventions" heading.
///
/// Non-numbered lines inside the section are skipped; a blank line ends it.
pub fn extract_interventions(text: &str) -> Vec<String> {
    let mut interventions = Vec::new();
    let mut in_section = false;

    for line in text.lines().map(str::trim) {
        let lower = line.to_ascii_lowercase();
        if !in_section {
            in_section = lower.contains("immediate") && lower.contains("intervention");
            continue;
        }
        if line.is_empty() {
            break;
        }
        if line.starts_with(|c: char| c.is_ascii_digit()) {
            let item = line.split_once(". ").map_or(line, |(_, rest)| rest).trim();
            interventions.push(item.to_string());
        }
    }
    interventions
}

pub fn extract_transport_guidelines(text: &str) -> TransportGuidelines {
    let section = extract_section(text, "transport", GUIDANCE_SECTIONS);

    let positioning = section
        .iter()
        .find(|l| contains_any(l, &["position"]))
        .map(|l| value_after_colon(l).to_string());
    let monitoring = section
        .iter()
        .filter(|l| contains_any(l, &["monitor"]))
        .map(|l| l.to_string())
        .collect();
    let precautions = section
        .iter()
        .filter(|l| contains_any(l, &["caution", "warning", "avoid"]))
        .map(|l| l.to_string())
        .collect();

    TransportGuidelines {
        positioning,
        monitoring,
        precautions,
    }
}

pub fn extract_hospital_preparations(text: &str) -> HospitalPreparations {
    let mut preparations = HospitalPreparations::default();
    for line in extract_section(text, "preparation", GUIDANCE_SECTIONS) {
        if contains_any(line, &["specialist", "consult"]) {
            preparations.specialist_requirements.push(line.to_string());
        } else if contains_any(line, &["equipment", "prepare"]) {
            preparations.equipment_preparation.push(line.to_string());
        } else {
            preparations.immediate_needs.push(line.to_string());
        }
    }
    preparations
}

/// Protocols: a line ending in `:` names a protocol and the lines after it
/// are its steps. Lines before the first name are ignored.
pub fn extract_protocols(text: &str) -> Vec<MedicalProtocol> {
    let mut protocols: Vec<MedicalProtocol> = Vec::new();
    for line in extract_section(text, "protocol", GUIDANCE_SECTIONS) {
        if let Some(name) = line.strip_suffix(':') {
            protocols.push(MedicalProtocol {
                name: name.trim().to_string(),
                steps: Vec::new(),
            });
        } else if let Some(current) = protocols.last_mut() {
            current.steps.push(line.to_string());
        }
    }
    protocols
}
