//! HTTP handlers
//!
//! - `GET /`: liveness
//! - `POST /incidents/`: run the pipeline for one report, write the report file
//! - `GET /catalog`: resource counts and last load time
//! - `POST /catalog/reload`: re-read the datasets

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::envelope::{ApiError, Enveloped, API_VERSION};
use super::AppState;
use crate::catalog::CatalogStats;
use crate::notify::dispatch_notifications;
use crate::triage::{intake_severity, ResponseTime};
use crate::types::{Incident, Location, VitalSigns};

/// Top-level fields every incident report must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "patient_age",
    "patient_gender",
    "chief_complaint",
    "location",
    "vitals",
];

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: API_VERSION,
    })
}

// ============================================================================
// Incidents
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IncidentRequest {
    pub patient_age: u32,
    pub patient_gender: String,
    pub chief_complaint: String,
    pub location: Location,
    pub vitals: VitalSigns,
}

impl IncidentRequest {
    pub fn into_incident(self) -> Incident {
        Incident::create(
            self.location,
            self.patient_age,
            self.patient_gender,
            self.chief_complaint,
            self.vitals,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentSummary {
    /// Intake triage level (3-5)
    pub severity_level: u8,
    pub response_time: ResponseTime,
    pub assigned_resources: Vec<String>,
    /// Severity produced by the assessment stage
    pub assessed_severity: i32,
}

#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    pub status: &'static str,
    pub incident_id: String,
    pub report_path: String,
    pub summary: IncidentSummary,
}

/// Decode a report body, naming the first missing field or the parse failure.
pub fn parse_incident_request(body: &[u8]) -> Result<IncidentRequest, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("Invalid JSON body: {e}"))?;
    let Some(object) = value.as_object() else {
        return Err("Request body must be a JSON object".to_string());
    };
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|f| object.get(**f).map_or(true, Value::is_null))
    {
        return Err(format!("Missing required field: {missing}"));
    }
    serde_json::from_value(value).map_err(|e| format!("Invalid data format: {e}"))
}

pub async fn create_incident(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IncidentResponse>, ApiError> {
    let request = parse_incident_request(&body).map_err(ApiError::Request)?;

    let mut incident = request.into_incident();
    let triage_level = intake_severity(&incident);
    info!(
        incident_id = %incident.id,
        triage_level,
        complaint = %incident.chief_complaint,
        "Incident received"
    );

    let bundle = state
        .pipeline
        .run_with_cancel(&mut incident, &state.shutdown)
        .await?;
    let report_path = state.reports.write(&incident, &bundle).await?;

    dispatch_notifications(state.notifier.as_ref(), &incident, &bundle).await;

    Ok(Json(IncidentResponse {
        status: "success",
        incident_id: incident.id.to_string(),
        report_path: report_path.display().to_string(),
        summary: IncidentSummary {
            severity_level: triage_level,
            response_time: ResponseTime::from_level(triage_level),
            assigned_resources: bundle.resource_allocation.recommended_resources.assigned_ids(),
            assessed_severity: bundle.severity_analysis.severity_level,
        },
    }))
}

// ============================================================================
// Catalog
// ============================================================================

pub async fn catalog_stats(State(state): State<AppState>) -> Enveloped<CatalogStats> {
    Enveloped(state.catalog.stats())
}

pub async fn reload_catalog(
    State(state): State<AppState>,
) -> Result<Enveloped<CatalogStats>, ApiError> {
    let catalog = state.catalog.clone();
    let stats = tokio::task::spawn_blocking(move || catalog.reload()).await??;
    Ok(Enveloped(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "patient_age": 67,
            "patient_gender": "female",
            "chief_complaint": "difficulty breathing",
            "location": {"lat": 40.7128, "lng": -74.0060, "description": "City Hall"},
            "vitals": {
                "heart_rate": 118,
                "blood_pressure_systolic": 150,
                "blood_pressure_diastolic": 95,
                "spo2": 86,
                "respiratory_rate": 28
            }
        })
    }

    fn parse(value: &Value) -> Result<IncidentRequest, String> {
        parse_incident_request(value.to_string().as_bytes())
    }

    #[test]
    fn test_parse_valid_request() {
        let request = parse(&body()).unwrap();
        assert_eq!(request.patient_age, 67);
        assert_eq!(request.location.latitude, 40.7128);
        assert_eq!(request.location.description.as_deref(), Some("City Hall"));
        assert_eq!(request.vitals.spo2, 86);
    }

    #[test]
    fn test_missing_fields_named_in_order() {
        let mut value = body();
        value.as_object_mut().unwrap().remove("vitals");
        assert_eq!(parse(&value).unwrap_err(), "Missing required field: vitals");

        value.as_object_mut().unwrap().remove("patient_gender");
        assert_eq!(parse(&value).unwrap_err(), "Missing required field: patient_gender");

        let mut value = body();
        value["location"] = Value::Null;
        assert_eq!(parse(&value).unwrap_err(), "Missing required field: location");
    }

    #[test]
    fn test_malformed_nested_field() {
        let mut value = body();
        value["vitals"]["spo2"] = json!("low");
        let err = parse(&value).unwrap_err();
        assert!(err.starts_with("Invalid data format:"), "{err}");
    }

    #[test]
    fn test_invalid_json() {
        assert!(parse_incident_request(b"{not json").unwrap_err().starts_with("Invalid JSON body"));
        assert_eq!(
            parse_incident_request(b"[1,2]").unwrap_err(),
            "Request body must be a JSON object"
        );
    }
}
