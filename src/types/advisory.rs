//! Advisory stage outputs and the assembled decision bundle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RankedResource;

// ============================================================================
// Stage identity
// ============================================================================

/// The three advisory stages, in the only order the pipeline runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    SeverityAssessment,
    ResourceAllocation,
    MedicalGuidance,
}

impl StageKind {
    pub const ORDER: [Self; 3] = [
        Self::SeverityAssessment,
        Self::ResourceAllocation,
        Self::MedicalGuidance,
    ];

    /// Key of this stage's output inside a [`DecisionBundle`].
    pub fn output_key(self) -> &'static str {
        match self {
            Self::SeverityAssessment => "severity_analysis",
            Self::ResourceAllocation => "resource_allocation",
            Self::MedicalGuidance => "medical_guidance",
        }
    }

    /// Label used in timeline entries and log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::SeverityAssessment => "Severity assessment",
            Self::ResourceAllocation => "Resource allocation",
            Self::MedicalGuidance => "Medical guidance",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeverityAssessment => write!(f, "severity_assessment"),
            Self::ResourceAllocation => write!(f, "resource_allocation"),
            Self::MedicalGuidance => write!(f, "medical_guidance"),
        }
    }
}

// ============================================================================
// Severity Assessment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityAnalysis {
    /// Conventionally 1-10; not clamped
    pub severity_level: i32,
    /// Ordered considerations with list markers stripped
    pub medical_considerations: Vec<String>,
    /// Unmodified reasoning-call response
    pub raw_analysis: String,
}

// ============================================================================
// Resource Allocation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendedResources {
    /// Selected ambulances, in dispatch priority order
    pub ambulances: Vec<RankedResource>,
    /// Destination hospital, absent when none is available
    pub hospital: Option<RankedResource>,
    pub additional_resources: Vec<String>,
}

impl RecommendedResources {
    /// Ids of every assigned unit: ambulances first, then the hospital.
    pub fn assigned_ids(&self) -> Vec<String> {
        self.ambulances
            .iter()
            .chain(self.hospital.iter())
            .map(|r| r.resource.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub recommended_resources: RecommendedResources,
    /// Reverse-geocoded street address of the incident, when one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_address: Option<String>,
    pub raw_allocation_plan: String,
}

// ============================================================================
// Medical Guidance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportGuidelines {
    pub positioning: Option<String>,
    pub monitoring: Vec<String>,
    pub precautions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HospitalPreparations {
    pub immediate_needs: Vec<String>,
    pub specialist_requirements: Vec<String>,
    pub equipment_preparation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalProtocol {
    pub name: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalGuidance {
    pub immediate_interventions: Vec<String>,
    pub transport_guidelines: TransportGuidelines,
    pub hospital_preparations: HospitalPreparations,
    pub medical_protocols: Vec<MedicalProtocol>,
    pub raw_guidance: String,
}

// ============================================================================
// Decision Bundle
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
}

impl TimelineEntry {
    pub fn now(action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
        }
    }
}

/// Terminal artifact of one pipeline run.
///
/// Either all three stage outputs are present or the run produced no bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBundle {
    pub severity_analysis: SeverityAnalysis,
    pub resource_allocation: ResourceAllocation,
    pub medical_guidance: MedicalGuidance,
    pub timeline: Vec<TimelineEntry>,
}

impl DecisionBundle {
    /// Timeline actions without timestamps.
    pub fn timeline_actions(&self) -> Vec<&str> {
        self.timeline.iter().map(|e| e.action.as_str()).collect()
    }

    /// Compare two bundles ignoring timeline timestamps.
    pub fn same_decisions(&self, other: &Self) -> bool {
        self.severity_analysis == other.severity_analysis
            && self.resource_allocation == other.resource_allocation
            && self.medical_guidance == other.medical_guidance
            && self.timeline_actions() == other.timeline_actions()
    }
}
