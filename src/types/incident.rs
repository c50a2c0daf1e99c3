//! Incident types: Location, VitalSigns, Incident

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::GeoError;

// ============================================================================
// Location
// ============================================================================

/// Geographic position of an incident or resource.
///
/// Valid when latitude is within [-90, 90] and longitude within [-180, 180].
/// The type does not enforce this on construction; call [`Location::validate`]
/// at the boundary where the value enters the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    /// True when both coordinates are finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validate(&self) -> Result<(), GeoError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(GeoError::InvalidLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Description if present, otherwise the coordinate pair.
    pub fn display_name(&self) -> String {
        match &self.description {
            Some(d) => d.clone(),
            None => format!("{:.5}, {:.5}", self.latitude, self.longitude),
        }
    }
}

// ============================================================================
// Vital Signs
// ============================================================================

/// Vital signs snapshot taken at the scene.
///
/// No clinical range is enforced here; range interpretation belongs to triage
/// and severity assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub heart_rate: u32,
    pub blood_pressure_systolic: u32,
    pub blood_pressure_diastolic: u32,
    /// Oxygen saturation (0-100 %)
    pub spo2: u32,
    pub respiratory_rate: u32,
}

impl VitalSigns {
    /// Ordered (label, value) pairs used by the report renderer.
    pub fn entries(&self) -> [(&'static str, u32); 5] {
        [
            ("heart_rate", self.heart_rate),
            ("blood_pressure_systolic", self.blood_pressure_systolic),
            ("blood_pressure_diastolic", self.blood_pressure_diastolic),
            ("spo2", self.spo2),
            ("respiratory_rate", self.respiratory_rate),
        ]
    }
}

impl std::fmt::Display for VitalSigns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HR {} bpm | BP {}/{} mmHg | SpO2 {}% | RR {}/min",
            self.heart_rate,
            self.blood_pressure_systolic,
            self.blood_pressure_diastolic,
            self.spo2,
            self.respiratory_rate
        )
    }
}

// ============================================================================
// Incident
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IncidentError {
    #[error("severity already assigned ({current}) for incident {id}")]
    SeverityAlreadyAssigned { id: Uuid, current: i32 },
}

/// One reported emergency.
///
/// Every field is fixed at creation except `severity_level`, which moves from
/// `None` to `Some` exactly once via [`Incident::assign_severity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    pub patient_age: u32,
    pub patient_gender: String,
    pub chief_complaint: String,
    pub vitals: VitalSigns,
    severity_level: Option<i32>,
}

impl Incident {
    /// Create a new incident with a fresh id and the current time.
    pub fn create(
        location: Location,
        patient_age: u32,
        patient_gender: impl Into<String>,
        chief_complaint: impl Into<String>,
        vitals: VitalSigns,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            location,
            patient_age,
            patient_gender: patient_gender.into(),
            chief_complaint: chief_complaint.into(),
            vitals,
            severity_level: None,
        }
    }

    pub fn severity_level(&self) -> Option<i32> {
        self.severity_level
    }

    pub fn assign_severity(&mut self, level: i32) -> Result<(), IncidentError> {
        match self.severity_level {
            Some(current) => Err(IncidentError::SeverityAlreadyAssigned {
                id: self.id,
                current,
            }),
            None => {
                self.severity_level = Some(level);
                Ok(())
            }
        }
    }

    /// First 8 hex characters of the id, used in file names and log lines.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals() -> VitalSigns {
        VitalSigns {
            heart_rate: 80,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 80,
            spo2: 98,
            respiratory_rate: 14,
        }
    }

    #[test]
    fn test_location_ranges() {
        assert!(Location::new(40.78, -73.96).is_valid());
        assert!(Location::new(90.0, 180.0).is_valid());
        assert!(Location::new(-90.0, -180.0).is_valid());
        assert!(!Location::new(90.01, 0.0).is_valid());
        assert!(!Location::new(0.0, -180.5).is_valid());
        assert!(!Location::new(f64::NAN, 0.0).is_valid());
        assert!(Location::new(91.0, 0.0).validate().is_err());
    }

    #[test]
    fn test_blank_description_is_dropped() {
        let loc = Location::new(1.0, 2.0).with_description("   ");
        assert!(loc.description.is_none());
        assert_eq!(loc.display_name(), "1.00000, 2.00000");
    }

    #[test]
    fn test_severity_transitions_once() {
        let mut incident =
            Incident::create(Location::new(40.0, -73.0), 54, "male", "chest pain", vitals());
        assert_eq!(incident.severity_level(), None);

        incident.assign_severity(7).unwrap();
        assert_eq!(incident.severity_level(), Some(7));

        let err = incident.assign_severity(3).unwrap_err();
        assert!(matches!(err, IncidentError::SeverityAlreadyAssigned { current: 7, .. }));
        assert_eq!(incident.severity_level(), Some(7));
    }

    #[test]
    fn test_incident_ids_are_unique() {
        let a = Incident::create(Location::new(0.0, 0.0), 30, "female", "fall", vitals());
        let b = Incident::create(Location::new(0.0, 0.0), 30, "female", "fall", vitals());
        assert_ne!(a.id, b.id);
        assert_eq!(a.short_id().len(), 8);
    }
}
