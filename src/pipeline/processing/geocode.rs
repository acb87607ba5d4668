use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics::names::GEOCODE_LOOKUPS;
use crate::types::Location;

/// Trait for geocoding a free-text place query to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// First candidate for the query, `Ok(None)` when the provider has no match
    async fn geocode(&self, query: &str) -> Result<Option<Location>>;
}

/// Outcome of one lookup. Misses and errors are not fatal to the record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoLookup {
    Found(Location),
    Miss,
    Failed,
}

impl GeoLookup {
    pub fn location(self) -> Option<Location> {
        match self {
            GeoLookup::Found(loc) => Some(loc),
            GeoLookup::Miss | GeoLookup::Failed => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            GeoLookup::Found(_) => "found",
            GeoLookup::Miss => "miss",
            GeoLookup::Failed => "failed",
        }
    }
}

/// Query string sent to the provider
pub fn query_for(place: &str, country: &str) -> String {
    format!("{}, {}", place, country)
}

#[derive(Clone)]
pub struct GeoResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl GeoResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    pub async fn resolve(&self, country: &str, place: &str) -> Option<Location> {
        self.lookup(country, place).await.location()
    }

    pub async fn lookup(&self, country: &str, place: &str) -> GeoLookup {
        let query = query_for(place, country);
        let outcome = match self.geocoder.geocode(&query).await {
            Ok(Some(location)) => {
                debug!(%query, %location, "geocoded");
                GeoLookup::Found(location)
            }
            Ok(None) => {
                debug!(%query, "no geocoding match");
                GeoLookup::Miss
            }
            Err(e) => {
                warn!(%query, error = %e, "geocoding failed; treating as no match");
                GeoLookup::Failed
            }
        };
        ::metrics::counter!(GEOCODE_LOOKUPS, "outcome" => outcome.label()).increment(1);
        outcome
    }
}
