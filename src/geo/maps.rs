//! Mapping provider: nearby points of interest and reverse geocoding
//!
//! "Nothing found" is a normal outcome and is returned as `Ok(None)`.
//! Only transport failures and provider-side errors become [`MapsError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MapsConfig;
use crate::types::Location;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("maps provider returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("maps API error {status}: {message}")]
    Api { status: String, message: String },
}

/// A place returned by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOfInterest {
    pub name: String,
    pub place_id: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vicinity: Option<String>,
    pub location: Location,
}

/// Reverse-geocoded description of a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub formatted_address: String,
    pub place_id: String,
    pub location_type: String,
    pub components: Vec<AddressComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[async_trait]
pub trait MapsProvider: Send + Sync {
    /// Best-rated hospital within `radius_m` metres, if any.
    async fn nearest_hospital(
        &self,
        location: &Location,
        radius_m: u32,
    ) -> Result<Option<PlaceOfInterest>, MapsError>;

    /// Street address and place metadata for a coordinate, if any.
    async fn reverse_geocode(&self, location: &Location)
        -> Result<Option<LocationDetails>, MapsError>;

    fn provider_name(&self) -> &'static str;
}

/// Build the configured provider.
///
/// Selecting `google` without an API key in the environment degrades to
/// [`NoMaps`] with a warning rather than failing start-up.
pub fn create_maps_provider(config: &MapsConfig) -> Arc<dyn MapsProvider> {
    match config.provider.as_str() {
        "google" => match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                info!(provider = "google", "Maps provider enabled");
                Arc::new(GoogleMapsClient::new(key, Duration::from_secs(config.request_timeout_secs)))
            }
            _ => {
                warn!(
                    env = %config.api_key_env,
                    "Google Maps selected but API key is not set, continuing without a maps provider"
                );
                Arc::new(NoMaps)
            }
        },
        _ => Arc::new(NoMaps),
    }
}

// ============================================================================
// NoMaps
// ============================================================================

/// Provider used when no mapping service is configured; every lookup is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMaps;

#[async_trait]
impl MapsProvider for NoMaps {
    async fn nearest_hospital(
        &self,
        _location: &Location,
        _radius_m: u32,
    ) -> Result<Option<PlaceOfInterest>, MapsError> {
        Ok(None)
    }

    async fn reverse_geocode(
        &self,
        _location: &Location,
    ) -> Result<Option<LocationDetails>, MapsError> {
        Ok(None)
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}

// ============================================================================
// Google Maps
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct RawPlaceGeometry {
    location: RawLatLng,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    name: String,
    place_id: String,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    vicinity: Option<String>,
    geometry: RawPlaceGeometry,
}

#[derive(Debug, Default, Deserialize)]
struct RawGeocodeGeometry {
    #[serde(default)]
    location_type: String,
}

#[derive(Debug, Deserialize)]
struct RawGeocode {
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    place_id: String,
    #[serde(default)]
    geometry: RawGeocodeGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

/// Google Places / Geocoding HTTP client.
#[derive(Clone)]
pub struct GoogleMapsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at a different API root (used by tests and proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, MapsError> {
        let mut params: Vec<(&str, String)> = query.to_vec();
        params.push(("key", self.api_key.clone()));

        let resp = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(MapsError::ServerError(resp.status()));
        }

        let envelope: ApiEnvelope<T> = resp.json().await?;
        match envelope.status.as_str() {
            "OK" => Ok(envelope.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(MapsError::Api {
                message: envelope.error_message.unwrap_or_default(),
                status: envelope.status,
            }),
        }
    }
}

/// Highest rating wins; unrated places count as 0 and ties keep API order.
fn best_rated(places: Vec<RawPlace>) -> Option<PlaceOfInterest> {
    let mut best: Option<RawPlace> = None;
    for place in places {
        let better = match &best {
            None => true,
            Some(current) => place.rating.unwrap_or(0.0) > current.rating.unwrap_or(0.0),
        };
        if better {
            best = Some(place);
        }
    }
    best.map(|p| PlaceOfInterest {
        name: p.name,
        place_id: p.place_id,
        rating: p.rating,
        vicinity: p.vicinity,
        location: Location::new(p.geometry.location.lat, p.geometry.location.lng),
    })
}

#[async_trait]
impl MapsProvider for GoogleMapsClient {
    async fn nearest_hospital(
        &self,
        location: &Location,
        radius_m: u32,
    ) -> Result<Option<PlaceOfInterest>, MapsError> {
        debug!(lat = location.latitude, lng = location.longitude, radius_m, "Searching for hospitals");
        let places: Vec<RawPlace> = self
            .get(
                "place/nearbysearch/json",
                &[
                    ("location", format!("{},{}", location.latitude, location.longitude)),
                    ("radius", radius_m.to_string()),
                    ("type", "hospital".to_string()),
                    ("keyword", "hospital".to_string()),
                ],
            )
            .await?;

        let found = best_rated(places);
        if found.is_none() {
            warn!(lat = location.latitude, lng = location.longitude, "No hospitals found nearby");
        }
        Ok(found)
    }

    async fn reverse_geocode(
        &self,
        location: &Location,
    ) -> Result<Option<LocationDetails>, MapsError> {
        let results: Vec<RawGeocode> = self
            .get(
                "geocode/json",
                &[("latlng", format!("{},{}", location.latitude, location.longitude))],
            )
            .await?;

        Ok(results.into_iter().next().map(|r| LocationDetails {
            formatted_address: r.formatted_address.unwrap_or_else(|| "Unknown".to_string()),
            place_id: r.place_id,
            location_type: r.geometry.location_type,
            components: r.address_components,
        }))
    }

    fn provider_name(&self) -> &'static str {
        "google"
    }
}
