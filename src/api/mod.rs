//! REST API module using Axum
//!
//! Routes live in [`routes`], handlers in [`handlers`]. Errors share the
//! envelope in [`envelope`].

pub mod envelope;
pub mod handlers;
mod routes;
mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::defaults::MAX_BODY_BYTES;

/// Build a CORS layer that is restrictive by default (same-origin only).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    if origins.is_empty() {
        return base;
    }
    let allowed: Vec<_> = origins.iter().filter_map(|o| o.trim().parse().ok()).collect();
    tracing::info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    routes::api_routes(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
}
