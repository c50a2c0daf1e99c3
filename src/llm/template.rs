//! Template backend: deterministic rule-based responses
//!
//! Used when no reasoning service is configured. It recognises which stage
//! is asking by the persona line the prompt opens with and answers in the
//! same headed-section format a real model is asked for, so the parsers and
//! the rest of the pipeline run unchanged offline.

use std::sync::OnceLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;

use super::LlmBackend;

const CRITICAL_COMPLAINTS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "not breathing",
    "unconscious",
    "unresponsive",
    "cardiac arrest",
    "severe bleeding",
    "stroke",
    "seizure",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateBackend;

impl TemplateBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmBackend for TemplateBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.contains("Emergency Detection Specialist") {
            Ok(severity_response(prompt))
        } else if prompt.contains("Resource Coordinator") {
            Ok(allocation_response(prompt))
        } else if prompt.contains("Medical Advisor") {
            Ok(guidance_response(prompt))
        } else {
            bail!("template backend has no template for this prompt")
        }
    }

    fn backend_name(&self) -> &'static str {
        "template"
    }
}

fn number_after(prompt: &str, label: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s\-*]*([A-Za-z0-9 ]+):\s*(\d+)").expect("static regex")
    });
    re.captures_iter(prompt)
        .find(|c| c[1].trim().eq_ignore_ascii_case(label))
        .and_then(|c| c[2].parse().ok())
}

fn line_value<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt.lines().find_map(|line| {
        let line = line.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '*');
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(label).then(|| value.trim())
    })
}

fn complaint_of(prompt: &str) -> String {
    line_value(prompt, "Symptoms")
        .or_else(|| line_value(prompt, "Chief Complaint"))
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_critical(complaint: &str) -> bool {
    CRITICAL_COMPLAINTS.iter().any(|k| complaint.contains(k))
}

/// Severity rules: 8 for a critical complaint, 4 otherwise, raised by one
/// (and to at least 7) for hypoxia, raised by one for extreme heart rate.
fn severity_response(prompt: &str) -> String {
    let complaint = complaint_of(prompt);
    let spo2 = number_after(prompt, "SpO2");
    let heart_rate = number_after(prompt, "Heart Rate");

    let mut level: u32 = if is_critical(&complaint) { 8 } else { 4 };
    let mut considerations = Vec::new();

    if is_critical(&complaint) {
        considerations.push(format!("Time-critical presentation: {complaint}"));
    }
    if let Some(spo2) = spo2.filter(|s| *s < 90) {
        level = (level + 1).max(7);
        considerations.push(format!("Hypoxia with SpO2 {spo2}%, airway and oxygenation priority"));
    }
    if let Some(hr) = heart_rate.filter(|hr| *hr > 130 || *hr < 45) {
        level += 1;
        considerations.push(format!("Heart rate {hr} bpm outside safe range"));
    }
    if considerations.is_empty() {
        considerations.push("Stable presentation, reassess vitals en route".to_string());
    }

    let considerations: String = considerations.iter().map(|c| format!("- {c}\n")).collect();
    format!(
        "Severity Level: {}\n\nMedical Considerations:\n{considerations}",
        level.min(10)
    )
}

fn allocation_response(prompt: &str) -> String {
    let severity = number_after(prompt, "Severity Level").unwrap_or(5);
    let (dispatch, additional) = if severity >= 8 {
        (
            "Dispatch 2 ambulances, nearest advanced life support units first.",
            "- Fire department first responders\n- Police for scene safety and traffic control",
        )
    } else {
        ("Dispatch 1 ambulance, the nearest available unit.", "- None")
    };

    format!(
        "{dispatch}
Transport to the nearest receiving hospital with open emergency beds.

Additional Resources:
{additional}
"
    )
}

fn guidance_response(prompt: &str) -> String {
    let complaint = complaint_of(prompt);
    let cardiac = complaint.contains("chest");
    let respiratory = complaint.contains("breath");
    let bleeding = complaint.contains("bleed");

    let mut interventions = vec!["Assess airway, breathing and circulation"];
    if respiratory || cardiac {
        interventions.push("Administer oxygen to keep SpO2 94-98%");
    }
    if cardiac {
        interventions.push("Give aspirin 324 mg chewed if not contraindicated");
        interventions.push("Obtain 12-lead ECG");
    }
    if bleeding {
        interventions.push("Apply direct pressure or tourniquet to control bleeding");
    }
    interventions.push("Establish IV access");

    let positioning = if respiratory || cardiac {
        "semi-recumbent at 45 degrees"
    } else if bleeding {
        "supine with legs elevated"
    } else {
        "position of comfort"
    };

    let numbered: Vec<String> = interventions
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect();
    let position = format!("Position: {positioning}");

    let mut lines: Vec<&str> = vec!["Immediate Interventions:"];
    lines.extend(numbered.iter().map(String::as_str));
    lines.extend([
        "",
        "Transport Considerations:",
        &position,
        "Monitor heart rate, blood pressure and SpO2 every 5 minutes",
    ]);
    if cardiac {
        lines.push("Monitor cardiac rhythm continuously");
    }
    lines.extend([
        "Caution: avoid unnecessary patient exertion",
        "",
        "Hospital Preparation:",
        "Notify emergency department of estimated arrival",
    ]);
    if cardiac {
        lines.extend(["Cardiology consult on arrival", "Prepare cath lab and defibrillator"]);
    } else if bleeding {
        lines.extend([
            "Trauma surgery consult on arrival",
            "Prepare blood products and equipment for transfusion",
        ]);
    } else {
        lines.push("Prepare monitoring equipment");
    }
    lines.extend(["", "Protocols:"]);
    if cardiac {
        lines.extend([
            "Acute coronary syndrome:",
            "Serial ECGs",
            "Nitroglycerin if systolic above 100",
        ]);
    }
    if respiratory {
        lines.extend(["Respiratory distress:", "Titrate oxygen to target saturation"]);
    }
    lines.extend(["General emergency care:", "Reassess vitals every 5 minutes", ""]);
    lines.join("\n")
}
