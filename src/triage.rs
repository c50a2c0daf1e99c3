//! Intake triage
//!
//! A fixed rule table applied to the raw report before any stage runs. Its
//! result drives the response-time class in the API summary and is kept
//! separate from the assessed severity the pipeline produces.

use serde::{Deserialize, Serialize};

use crate::types::Incident;

const CRITICAL_COMPLAINTS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "unconscious",
    "severe bleeding",
];

pub const BASELINE_LEVEL: u8 = 3;
pub const ABNORMAL_VITALS_LEVEL: u8 = 4;
pub const CRITICAL_COMPLAINT_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTime {
    Immediate,
    Urgent,
    Standard,
}

impl ResponseTime {
    pub fn from_level(level: u8) -> Self {
        match level {
            5.. => Self::Immediate,
            4 => Self::Urgent,
            _ => Self::Standard,
        }
    }
}

impl std::fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Urgent => write!(f, "urgent"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

/// Intake severity on a 3-5 scale.
///
/// - 5: the complaint names a critical presentation
/// - 4: heart rate > 120 or < 50, systolic > 180 or < 90, or SpO2 < 90
/// - 3: otherwise
pub fn intake_severity(incident: &Incident) -> u8 {
    let complaint = incident.chief_complaint.to_lowercase();
    if CRITICAL_COMPLAINTS.iter().any(|k| complaint.contains(k)) {
        return CRITICAL_COMPLAINT_LEVEL;
    }

    let v = &incident.vitals;
    let abnormal = v.heart_rate > 120
        || v.heart_rate < 50
        || v.blood_pressure_systolic > 180
        || v.blood_pressure_systolic < 90
        || v.spo2 < 90;
    if abnormal {
        ABNORMAL_VITALS_LEVEL
    } else {
        BASELINE_LEVEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, VitalSigns};

    fn incident(complaint: &str, hr: u32, systolic: u32, spo2: u32) -> Incident {
        Incident::create(
            Location::new(40.0, -74.0),
            50,
            "male",
            complaint,
            VitalSigns {
                heart_rate: hr,
                blood_pressure_systolic: systolic,
                blood_pressure_diastolic: 80,
                spo2,
                respiratory_rate: 16,
            },
        )
    }

    #[test]
    fn test_critical_complaint() {
        assert_eq!(intake_severity(&incident("Chest pain since noon", 140, 120, 85)), 5);
        assert_eq!(intake_severity(&incident("found unconscious", 80, 120, 98)), 5);
    }

    #[test]
    fn test_abnormal_vitals() {
        assert_eq!(intake_severity(&incident("dizziness", 130, 120, 98)), 4);
        assert_eq!(intake_severity(&incident("dizziness", 45, 120, 98)), 4);
        assert_eq!(intake_severity(&incident("dizziness", 80, 190, 98)), 4);
        assert_eq!(intake_severity(&incident("dizziness", 80, 85, 98)), 4);
        assert_eq!(intake_severity(&incident("dizziness", 80, 120, 89)), 4);
    }

    #[test]
    fn test_boundaries_are_normal() {
        assert_eq!(intake_severity(&incident("headache", 120, 180, 90)), 3);
        assert_eq!(intake_severity(&incident("headache", 50, 90, 95)), 3);
    }

    #[test]
    fn test_response_time() {
        assert_eq!(ResponseTime::from_level(5), ResponseTime::Immediate);
        assert_eq!(ResponseTime::from_level(4), ResponseTime::Urgent);
        assert_eq!(ResponseTime::from_level(3), ResponseTime::Standard);
        assert_eq!(ResponseTime::Urgent.to_string(), "urgent");
    }
}
