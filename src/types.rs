use serde::{Deserialize, Serialize};
use std::fmt;

/// A (latitude, longitude) pair. Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location(pub f64, pub f64);

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self(latitude, longitude)
    }

    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    /// Bit-level key used for collision detection. Two locations collide only when
    /// both coordinates are bit-identical.
    pub fn bits(&self) -> (u64, u64) {
        (self.0.to_bits(), self.1.to_bits())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A stadium row as it leaves the extract stage, before type coercion and geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedStadium {
    pub rank: u32,
    pub name: String,
    /// Digits only once separators are stripped, but not yet coerced
    pub capacity: String,
    pub city: String,
    pub country: String,
    pub region: String,
    pub tenants: String,
    pub sports: String,
    /// Absolute URL or the `NO_IMAGE` sentinel
    pub image_url: String,
}

/// The canonical record handed to the load stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StadiumRecord {
    pub rank: u32,
    pub name: String,
    pub capacity: u64,
    pub city: String,
    pub country: String,
    pub region: String,
    pub tenants: String,
    pub sports: String,
    pub image_url: String,
    pub location: Option<Location>,
}
