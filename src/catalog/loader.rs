//! Dataset loading
//!
//! Each dataset is a JSON file holding `{"<key>": [ ... ]}` (a bare array is
//! also accepted). A missing file is an empty dataset. A file that is not
//! valid JSON is an error. Individual records that fail to parse or carry
//! out-of-range coordinates are dropped with a warning so one bad entry
//! never hides the rest of the fleet.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::CatalogError;
use crate::types::{CapacityRecord, Location, Resource, ResourceDetails, ResourceStatus};

// ============================================================================
// Raw records
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAmbulance {
    #[serde(alias = "ambulance_id", alias = "unit_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    location: Location,
    #[serde(default)]
    status: String,
    #[serde(default = "default_unit_type", alias = "type")]
    unit_type: String,
    #[serde(default)]
    crew_size: Option<u32>,
    #[serde(default)]
    equipment: Vec<String>,
}

fn default_unit_type() -> String {
    "BLS".to_string()
}

#[derive(Debug, Deserialize)]
struct RawHospital {
    #[serde(alias = "hospital_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    location: Location,
    #[serde(default = "default_hospital_status")]
    status: String,
    #[serde(default, alias = "capacity")]
    emergency_department: Option<RawCapacity>,
    #[serde(default)]
    specialties: Vec<String>,
    #[serde(default)]
    trauma_level: Option<u8>,
}

fn default_hospital_status() -> String {
    "available".to_string()
}

#[derive(Debug, Deserialize)]
struct RawCapacity {
    #[serde(default)]
    total_beds: u32,
    #[serde(default, alias = "beds_available")]
    available_beds: u32,
    #[serde(default)]
    icu_beds_available: Option<u32>,
    #[serde(default, alias = "current_wait_time")]
    wait_time_minutes: Option<u32>,
    #[serde(default)]
    on_diversion: bool,
}

#[derive(Debug, Deserialize)]
struct RawPersonnel {
    #[serde(alias = "personnel_id", alias = "staff_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    location: Location,
    #[serde(default)]
    status: String,
    #[serde(default, alias = "specialty")]
    role: String,
    #[serde(default)]
    certifications: Vec<String>,
}

trait IntoResource {
    fn into_resource(self) -> Resource;
}

impl IntoResource for RawAmbulance {
    fn into_resource(self) -> Resource {
        Resource {
            id: self.id,
            name: self.name,
            location: self.location,
            status: ResourceStatus::from_str_loose(&self.status),
            details: ResourceDetails::Ambulance {
                unit_type: self.unit_type,
                crew_size: self.crew_size,
                equipment: self.equipment,
            },
        }
    }
}

impl IntoResource for RawHospital {
    fn into_resource(self) -> Resource {
        Resource {
            id: self.id,
            name: self.name,
            location: self.location,
            status: ResourceStatus::from_str_loose(&self.status),
            details: ResourceDetails::Hospital {
                capacity: self.emergency_department.map(|c| CapacityRecord {
                    total_beds: c.total_beds,
                    available_beds: c.available_beds,
                    icu_beds_available: c.icu_beds_available,
                    wait_time_minutes: c.wait_time_minutes,
                    on_diversion: c.on_diversion,
                }),
                specialties: self.specialties,
                trauma_level: self.trauma_level,
            },
        }
    }
}

impl IntoResource for RawPersonnel {
    fn into_resource(self) -> Resource {
        Resource {
            id: self.id,
            name: self.name,
            location: self.location,
            status: ResourceStatus::from_str_loose(&self.status),
            details: ResourceDetails::Personnel {
                role: self.role,
                certifications: self.certifications,
            },
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

pub fn load_ambulances(path: &Path) -> Result<Vec<Resource>, CatalogError> {
    load_dataset::<RawAmbulance>(path, "ambulances")
}

pub fn load_hospitals(path: &Path) -> Result<Vec<Resource>, CatalogError> {
    load_dataset::<RawHospital>(path, "hospitals")
}

pub fn load_personnel(path: &Path) -> Result<Vec<Resource>, CatalogError> {
    load_dataset::<RawPersonnel>(path, "personnel")
}

fn load_dataset<R>(path: &Path, key: &str) -> Result<Vec<Resource>, CatalogError>
where
    R: DeserializeOwned + IntoResource,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Dataset file not found, using empty collection");
            return Ok(Vec::new());
        }
        Err(e) => return Err(CatalogError::Io(path.to_path_buf(), e)),
    };

    let root: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| CatalogError::Parse(path.to_path_buf(), e))?;

    let records = match root {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove(key) {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(CatalogError::Shape {
                    path: path.to_path_buf(),
                    message: format!("'{key}' must be an array"),
                })
            }
            None => {
                warn!(path = %path.display(), key, "Dataset has no entries under expected key");
                Vec::new()
            }
        },
        _ => {
            return Err(CatalogError::Shape {
                path: path.to_path_buf(),
                message: format!("expected an object with '{key}' or an array"),
            })
        }
    };

    let total = records.len();
    let mut resources = Vec::with_capacity(total);
    for (index, value) in records.into_iter().enumerate() {
        let resource = match serde_json::from_value::<R>(value) {
            Ok(raw) => raw.into_resource(),
            Err(e) => {
                warn!(path = %path.display(), index, error = %e, "Dropping malformed dataset record");
                continue;
            }
        };
        if !resource.location.is_valid() {
            warn!(
                path = %path.display(),
                id = %resource.id,
                lat = resource.location.latitude,
                lng = resource.location.longitude,
                "Dropping dataset record with out-of-range coordinates"
            );
            continue;
        }
        resources.push(resource);
    }

    debug!(path = %path.display(), loaded = resources.len(), total, "Dataset loaded");
    Ok(resources)
}
