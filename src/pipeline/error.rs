use thiserror::Error;

use crate::agents::StageError;
use crate::geo::GeoError;
use crate::types::{IncidentError, StageKind, TimelineEntry};

/// Structural problems found before any stage runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidLocation(#[from] GeoError),

    #[error(transparent)]
    AlreadyAssessed(#[from] IncidentError),

    #[error("chief complaint must not be empty")]
    EmptyComplaint,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("incident validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A stage failed; `timeline` holds every entry recorded up to and
    /// including the failure.
    #[error("{stage} stage failed: {source}")]
    StageFailure {
        stage: StageKind,
        #[source]
        source: StageError,
        timeline: Vec<TimelineEntry>,
    },

    /// Cancellation observed at a stage boundary; `timeline` ends with the
    /// "<stage> cancelled" entry.
    #[error("run cancelled before {stage}")]
    Cancelled {
        stage: StageKind,
        timeline: Vec<TimelineEntry>,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::Validation(_) => None,
            Self::StageFailure { stage, .. } | Self::Cancelled { stage, .. } => Some(*stage),
        }
    }

    /// Entries recorded before the run stopped, if it got past validation.
    pub fn timeline(&self) -> Option<&[TimelineEntry]> {
        match self {
            Self::Validation(_) => None,
            Self::StageFailure { timeline, .. } | Self::Cancelled { timeline, .. } => {
                Some(timeline)
            }
        }
    }

    /// Whether the caller sent a bad incident (as opposed to a run failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
