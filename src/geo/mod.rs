//! Geographic services: proximity ranking and the mapping provider
//!
//! ## Modules
//!
//! - [`proximity`]: great-circle distance and nearest-first ranking of
//!   catalog resources
//! - [`maps`]: points-of-interest lookup and reverse geocoding behind the
//!   [`MapsProvider`] trait

pub mod maps;
pub mod proximity;

pub use maps::{
    create_maps_provider, GoogleMapsClient, LocationDetails, MapsError, MapsProvider, NoMaps,
    PlaceOfInterest,
};
pub use proximity::{haversine_km, rank, EARTH_RADIUS_KM};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeoError {
    #[error("invalid location ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("invalid location for resource {id}: ({latitude}, {longitude})")]
    InvalidResourceLocation {
        id: String,
        latitude: f64,
        longitude: f64,
    },
}
