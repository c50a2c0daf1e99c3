//! Response envelopes for incident failures and catalog endpoints.
//!
//! Every failure leaves the API as `{ "error": { "code", "message", "stage"? },
//! "meta": { "timestamp", "version" } }`. Catalog endpoints wrap their payload
//! as `{ "data", "meta" }`; the incident and health endpoints keep flat
//! success bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::catalog::CatalogError;
use crate::pipeline::PipelineError;
use crate::report::ReportError;
use crate::types::StageKind;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Meta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: API_VERSION,
        }
    }
}

/// Catalog payload stamped with [`Meta`].
#[derive(Debug)]
pub struct Enveloped<T>(pub T);

impl<T: Serialize> IntoResponse for Enveloped<T> {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body<T> {
            data: T,
            meta: Meta,
        }

        Json(Body {
            data: self.0,
            meta: Meta::now(),
        })
        .into_response()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    InternalError,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Anything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body could not be decoded into an incident report.
    #[error("{0}")]
    Request(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("catalog reload task failed: {0}")]
    ReloadTask(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Request(_) | Self::Pipeline(PipelineError::Validation(_)) => ErrorCode::BadRequest,
            Self::Pipeline(PipelineError::Cancelled { .. }) => ErrorCode::ServiceUnavailable,
            Self::Pipeline(PipelineError::StageFailure { .. })
            | Self::Report(_)
            | Self::Catalog(_)
            | Self::ReloadTask(_) => ErrorCode::InternalError,
        }
    }

    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::Pipeline(e) => e.stage(),
            _ => None,
        }
    }

    /// Text returned to the caller. Stage failures name the stage and a
    /// generic cause; provider and filesystem detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Request(message) => message.clone(),
            Self::Pipeline(PipelineError::StageFailure { stage, source, .. }) => {
                format!("{} failed: {}", stage.label(), source.public_message())
            }
            Self::Pipeline(e) => e.to_string(),
            Self::Report(_) => "Failed to write incident report".to_string(),
            Self::Catalog(e) => format!("Catalog reload failed: {e}"),
            Self::ReloadTask(_) => "Catalog reload failed".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<StageKind>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: Meta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        match (&self, code) {
            // The pipeline already logged the stage failure with its context.
            (Self::Pipeline(PipelineError::StageFailure { .. }), _) => {}
            (_, ErrorCode::InternalError) => error!(error = %self, "Request failed"),
            _ => warn!(code = ?code, error = %self, "Request rejected"),
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.public_message(),
                stage: self.stage(),
            },
            meta: Meta::now(),
        };
        (code.status(), Json(body)).into_response()
    }
}
