//! Proximity ranking
//!
//! Distances are great-circle (haversine) kilometres on a spherical Earth
//! using the IUGG mean radius. For dispatch-scale distances the error versus
//! an ellipsoidal geodesic stays well under 0.5 %.

use super::GeoError;
use crate::types::{Location, RankedResource, Resource};

/// IUGG mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Rank `candidates` nearest-first from `origin`.
///
/// Candidates strictly farther than `max_distance_km` are excluded before
/// sorting. Equal distances keep their input order. Every location, the
/// origin included, is validated first so an invalid candidate fails the
/// whole call even when it would have been filtered out.
pub fn rank(
    origin: &Location,
    candidates: &[Resource],
    max_distance_km: Option<f64>,
) -> Result<Vec<RankedResource>, GeoError> {
    origin.validate()?;
    if let Some(bad) = candidates.iter().find(|r| !r.location.is_valid()) {
        return Err(GeoError::InvalidResourceLocation {
            id: bad.id.clone(),
            latitude: bad.location.latitude,
            longitude: bad.location.longitude,
        });
    }

    let mut ranked: Vec<RankedResource> = candidates
        .iter()
        .map(|resource| RankedResource {
            distance_km: haversine_km(origin, &resource.location),
            resource: resource.clone(),
        })
        .filter(|r| max_distance_km.map_or(true, |max| r.distance_km <= max))
        .collect();

    // sort_by is stable, so ties keep input order
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(ranked)
}
