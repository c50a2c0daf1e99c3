//! API route definitions
//!
//! - `GET /` - health check
//! - `POST /incidents/` - submit an incident report (also accepted without the trailing slash)
//! - `GET /catalog` - catalog statistics
//! - `POST /catalog/reload` - reload datasets from disk

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::AppState;

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route("/incidents/", post(handlers::create_incident))
        .route("/incidents", post(handlers::create_incident))
        .route("/catalog", get(handlers::catalog_stats))
        .route("/catalog/reload", post(handlers::reload_catalog))
        .with_state(state)
}
