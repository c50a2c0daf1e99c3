//! Resource types: ResourceStatus, CapacityRecord, Resource, RankedResource

use serde::{Deserialize, Serialize};

use super::Location;

// ============================================================================
// Status
// ============================================================================

/// Availability of an ambulance, hospital or staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Available,
    Unavailable,
    Dispatched,
}

impl ResourceStatus {
    /// Parse a dataset status string (case-insensitive).
    ///
    /// Anything unrecognised is treated as `Unavailable` so that a typo in a
    /// dataset never makes a unit look dispatchable.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "available" => Self::Available,
            "dispatched" | "en_route" | "en route" | "assigned" => Self::Dispatched,
            _ => Self::Unavailable,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Dispatched => write!(f, "dispatched"),
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Ambulance,
    Hospital,
    Personnel,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ambulance => write!(f, "ambulance"),
            Self::Hospital => write!(f, "hospital"),
            Self::Personnel => write!(f, "personnel"),
        }
    }
}

/// Emergency department capacity of a hospital.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapacityRecord {
    #[serde(default)]
    pub total_beds: u32,
    #[serde(default)]
    pub available_beds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icu_beds_available: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time_minutes: Option<u32>,
    /// Hospital has declared ambulance diversion
    #[serde(default)]
    pub on_diversion: bool,
}

impl CapacityRecord {
    pub fn can_accept(&self) -> bool {
        !self.on_diversion && self.available_beds > 0
    }
}

/// Type-specific attributes of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceDetails {
    Ambulance {
        /// Unit level, e.g. "ALS" or "BLS"
        unit_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crew_size: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        equipment: Vec<String>,
    },
    Hospital {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity: Option<CapacityRecord>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        specialties: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trauma_level: Option<u8>,
    },
    Personnel {
        role: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        certifications: Vec<String>,
    },
}

// ============================================================================
// Resource
// ============================================================================

/// A dispatchable unit owned by the resource catalog.
///
/// The pipeline never mutates a resource; an allocation is a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: Location,
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub details: ResourceDetails,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self.details {
            ResourceDetails::Ambulance { .. } => ResourceKind::Ambulance,
            ResourceDetails::Hospital { .. } => ResourceKind::Hospital,
            ResourceDetails::Personnel { .. } => ResourceKind::Personnel,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ResourceStatus::Available
    }

    /// Human-readable label: name when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn capacity(&self) -> Option<&CapacityRecord> {
        match &self.details {
            ResourceDetails::Hospital { capacity, .. } => capacity.as_ref(),
            _ => None,
        }
    }

    pub fn unit_type(&self) -> Option<&str> {
        match &self.details {
            ResourceDetails::Ambulance { unit_type, .. } => Some(unit_type),
            _ => None,
        }
    }

    pub fn specialties(&self) -> &[String] {
        match &self.details {
            ResourceDetails::Hospital { specialties, .. } => specialties,
            _ => &[],
        }
    }
}

/// A resource annotated with its distance from a reference location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResource {
    pub resource: Resource,
    pub distance_km: f64,
}

impl std::fmt::Display for RankedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource.name {
            Some(name) => write!(f, "{name} ({})", self.resource.id)?,
            None => write!(f, "{}", self.resource.id)?,
        }
        if let Some(unit) = self.resource.unit_type() {
            write!(f, " [{unit}]")?;
        }
        write!(f, " - {:.1} km", self.distance_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str_loose() {
        assert_eq!(ResourceStatus::from_str_loose("Available"), ResourceStatus::Available);
        assert_eq!(ResourceStatus::from_str_loose(" dispatched "), ResourceStatus::Dispatched);
        assert_eq!(ResourceStatus::from_str_loose("out_of_service"), ResourceStatus::Unavailable);
        assert_eq!(ResourceStatus::from_str_loose(""), ResourceStatus::Unavailable);
    }

    #[test]
    fn test_capacity_acceptance() {
        let open = CapacityRecord { total_beds: 20, available_beds: 3, ..Default::default() };
        let full = CapacityRecord { total_beds: 20, available_beds: 0, ..Default::default() };
        let diverting = CapacityRecord { available_beds: 5, on_diversion: true, ..Default::default() };
        assert!(open.can_accept());
        assert!(!full.can_accept());
        assert!(!diverting.can_accept());
    }

    #[test]
    fn test_ranked_resource_display() {
        let ranked = RankedResource {
            resource: Resource {
                id: "AMB-001".to_string(),
                name: None,
                location: Location::new(40.0, -73.0),
                status: ResourceStatus::Available,
                details: ResourceDetails::Ambulance {
                    unit_type: "ALS".to_string(),
                    crew_size: Some(2),
                    equipment: Vec::new(),
                },
            },
            distance_km: 1.234,
        };
        assert_eq!(ranked.to_string(), "AMB-001 [ALS] - 1.2 km");
    }
}
