use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};

use crate::config::{EnrichConfig, GeocodeAnchor};
use crate::constants::NO_IMAGE;
use crate::error::{PipelineError, Result};
use crate::metrics::names::{CAPACITY_FORMAT_ERRORS, LOCATION_COLLISIONS};
use crate::pipeline::processing::geocode::{GeoLookup, GeoResolver};
use crate::pipeline::processing::text::strip_separators;
use crate::types::{ExtractedStadium, Location, StadiumRecord};

/// Counters describing one enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichStats {
    pub records: usize,
    pub primary_found: usize,
    pub primary_missed: usize,
    pub collisions_flagged: usize,
    /// Flagged records whose second lookup produced a different, present location
    pub collisions_repaired: usize,
    pub capacity_format_errors: usize,
}

/// Trait for turning extracted rows into canonical stadium records
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, records: Vec<ExtractedStadium>) -> (Vec<StadiumRecord>, EnrichStats);
}

/// Geocodes every record, fills image placeholders, coerces capacity and
/// re-queries records whose coordinates repeat an earlier record's.
pub struct EnrichmentStage {
    resolver: GeoResolver,
    placeholder_image_url: String,
    primary_anchor: GeocodeAnchor,
    concurrency: usize,
}

impl EnrichmentStage {
    pub fn new(resolver: GeoResolver, config: &EnrichConfig) -> Self {
        Self {
            resolver,
            placeholder_image_url: config.placeholder_image_url.clone(),
            primary_anchor: config.primary_anchor,
            concurrency: 1,
        }
    }

    /// Number of primary lookups allowed in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn primary_place<'a>(&self, record: &'a ExtractedStadium) -> &'a str {
        match self.primary_anchor {
            GeocodeAnchor::StadiumName => &record.name,
            GeocodeAnchor::City => &record.city,
        }
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn run(&self, records: Vec<ExtractedStadium>) -> (Vec<StadiumRecord>, EnrichStats) {
        let mut stats = EnrichStats {
            records: records.len(),
            ..Default::default()
        };

        // Primary pass. `buffered` keeps results in input order.
        let lookups: Vec<_> = records
            .iter()
            .map(|record| {
                let resolver = self.resolver.clone();
                let country = record.country.clone();
                let place = self.primary_place(record).to_string();
                async move { resolver.lookup(&country, &place).await }
            })
            .collect();
        let primary: Vec<GeoLookup> = stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await;

        for lookup in &primary {
            match lookup {
                GeoLookup::Found(_) => stats.primary_found += 1,
                GeoLookup::Miss | GeoLookup::Failed => stats.primary_missed += 1,
            }
        }

        // Every primary lookup has completed; detect collisions on the snapshot
        let snapshot: Vec<Option<Location>> = primary.iter().map(|l| l.location()).collect();
        let flagged = find_repeated_locations(&snapshot);
        stats.collisions_flagged = flagged.len();
        ::metrics::counter!(LOCATION_COLLISIONS).increment(flagged.len() as u64);

        let mut repairs: HashMap<usize, Option<Location>> = HashMap::with_capacity(flagged.len());
        for idx in flagged {
            let record = &records[idx];
            let repaired = self.resolver.resolve(&record.country, &record.city).await;
            if repaired.is_some() && repaired != snapshot[idx] {
                stats.collisions_repaired += 1;
            }
            info!(
                rank = record.rank,
                stadium = %record.name,
                previous = ?snapshot[idx],
                repaired = ?repaired,
                "re-geocoded duplicate location by city"
            );
            repairs.insert(idx, repaired);
        }

        let enriched: Vec<StadiumRecord> = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| {
                let location = repairs.remove(&idx).unwrap_or(snapshot[idx]);
                let capacity = match coerce_capacity(&record.capacity) {
                    Ok(capacity) => capacity,
                    Err(e) => {
                        stats.capacity_format_errors += 1;
                        ::metrics::counter!(CAPACITY_FORMAT_ERRORS).increment(1);
                        warn!(rank = record.rank, error = %e, "capacity defaulted to 0");
                        0
                    }
                };
                StadiumRecord {
                    rank: record.rank,
                    image_url: resolve_image(&record.image_url, &self.placeholder_image_url),
                    name: record.name,
                    capacity,
                    city: record.city,
                    country: record.country,
                    region: record.region,
                    tenants: record.tenants,
                    sports: record.sports,
                    location,
                }
            })
            .collect();

        info!(
            "Enriched {} records: {} located, {} unlocated, {} duplicate locations ({} repaired)",
            stats.records,
            stats.primary_found,
            stats.primary_missed,
            stats.collisions_flagged,
            stats.collisions_repaired
        );

        (enriched, stats)
    }
}

#[async_trait]
impl Enricher for EnrichmentStage {
    async fn enrich(&self, records: Vec<ExtractedStadium>) -> (Vec<StadiumRecord>, EnrichStats) {
        self.run(records).await
    }
}

/// Indices of every location equal to one seen at a lower index. First occurrences
/// and absent locations are never returned.
pub fn find_repeated_locations(locations: &[Option<Location>]) -> Vec<usize> {
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    locations
        .iter()
        .enumerate()
        .filter_map(|(idx, loc)| {
            let loc = loc.as_ref()?;
            if seen.insert(loc.bits()) {
                None
            } else {
                Some(idx)
            }
        })
        .collect()
}

/// Parse capacity text. Separators are stripped again so text from any handoff
/// producer coerces the same way.
pub fn coerce_capacity(text: &str) -> Result<u64> {
    let digits = strip_separators(text.trim());
    digits.parse::<u64>().map_err(|e| PipelineError::Format {
        value: text.to_string(),
        reason: e.to_string(),
    })
}

pub fn resolve_image(url: &str, placeholder: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url == NO_IMAGE {
        placeholder.to_string()
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PLACEHOLDER_IMAGE_URL;
    use crate::pipeline::processing::geocode::testing::MockGeocoder;
    use std::sync::Arc;

    fn stadium(rank: u32, name: &str, city: &str, country: &str, capacity: &str) -> ExtractedStadium {
        ExtractedStadium {
            rank,
            name: name.to_string(),
            capacity: capacity.to_string(),
            city: city.to_string(),
            country: country.to_string(),
            region: "Europe".to_string(),
            tenants: "N/A".to_string(),
            sports: "Football".to_string(),
            image_url: NO_IMAGE.to_string(),
        }
    }

    fn stage(geocoder: Arc<MockGeocoder>) -> EnrichmentStage {
        EnrichmentStage::new(GeoResolver::new(geocoder), &EnrichConfig::default())
    }

    #[tokio::test]
    async fn test_only_second_duplicate_is_requeried_by_city() {
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with("Olympic Stadium, Germany", 52.5147, 13.2395)
                .with("Olympic Stadium Munich, Germany", 52.5147, 13.2395)
                .with("Munich, Germany", 48.1351, 11.582),
        );
        let records = vec![
            stadium(1, "Olympic Stadium", "Berlin", "Germany", "74475"),
            stadium(2, "Olympic Stadium Munich", "Munich", "Germany", "69250"),
        ];

        let (enriched, stats) = stage(geocoder.clone()).run(records).await;

        assert_eq!(enriched[0].location, Some(Location::new(52.5147, 13.2395)));
        assert_eq!(enriched[1].location, Some(Location::new(48.1351, 11.582)));
        assert_eq!(stats.collisions_flagged, 1);
        assert_eq!(stats.collisions_repaired, 1);
        assert_eq!(
            geocoder.queries(),
            vec![
                "Olympic Stadium, Germany".to_string(),
                "Olympic Stadium Munich, Germany".to_string(),
                "Munich, Germany".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_third_repeat_is_also_flagged_but_first_kept() {
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with("A, X", 1.0, 1.0)
                .with("B, X", 1.0, 1.0)
                .with("C, X", 1.0, 1.0)
                .with("Cb, X", 2.0, 2.0),
        );
        let records = vec![
            stadium(1, "A", "Ca", "X", "1"),
            stadium(2, "B", "Cb", "X", "1"),
            stadium(3, "C", "Cc", "X", "1"),
        ];

        let (enriched, stats) = stage(geocoder).run(records).await;

        assert_eq!(enriched[0].location, Some(Location::new(1.0, 1.0)));
        assert_eq!(enriched[1].location, Some(Location::new(2.0, 2.0)));
        // city lookup missed, so the location becomes absent
        assert_eq!(enriched[2].location, None);
        assert_eq!(stats.collisions_flagged, 2);
        assert_eq!(stats.collisions_repaired, 1);
    }

    #[tokio::test]
    async fn test_absent_locations_never_collide() {
        let geocoder = Arc::new(MockGeocoder::new());
        let records = vec![
            stadium(1, "A", "Ca", "X", "1"),
            stadium(2, "B", "Cb", "X", "1"),
        ];

        let (enriched, stats) = stage(geocoder.clone()).run(records).await;

        assert!(enriched.iter().all(|r| r.location.is_none()));
        assert_eq!(stats.collisions_flagged, 0);
        assert_eq!(geocoder.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_repair_may_still_collide() {
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with("A, X", 5.0, 5.0)
                .with("B, X", 5.0, 5.0)
                .with("Same, X", 5.0, 5.0),
        );
        let records = vec![
            stadium(1, "A", "Same", "X", "1"),
            stadium(2, "B", "Same", "X", "1"),
        ];

        let (enriched, stats) = stage(geocoder.clone()).run(records).await;

        assert_eq!(enriched[1].location, Some(Location::new(5.0, 5.0)));
        assert_eq!(stats.collisions_repaired, 0);
        // No second repair pass
        assert_eq!(geocoder.queries().len(), 3);
    }

    #[tokio::test]
    async fn test_image_and_capacity_normalized() {
        let mut with_image = stadium(2, "B", "Cb", "X", "45.000");
        with_image.image_url = "https://upload.wikimedia.org/b.jpg".to_string();
        let mut empty_image = stadium(3, "C", "Cc", "X", "not known");
        empty_image.image_url = String::new();
        let records = vec![stadium(1, "A", "Ca", "X", "45,000"), with_image, empty_image];

        let (enriched, stats) = stage(Arc::new(MockGeocoder::new())).run(records).await;

        assert_eq!(enriched[0].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(enriched[1].image_url, "https://upload.wikimedia.org/b.jpg");
        assert_eq!(enriched[2].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(enriched[0].capacity, 45_000);
        assert_eq!(enriched[1].capacity, 45_000);
        assert_eq!(enriched[2].capacity, 0);
        assert_eq!(stats.capacity_format_errors, 1);
    }

    #[tokio::test]
    async fn test_city_anchor_changes_primary_query() {
        let geocoder = Arc::new(MockGeocoder::new());
        let config = EnrichConfig {
            primary_anchor: GeocodeAnchor::City,
            ..EnrichConfig::default()
        };
        let stage = EnrichmentStage::new(GeoResolver::new(geocoder.clone()), &config);

        stage.run(vec![stadium(1, "Anfield", "Liverpool", "England", "1")]).await;

        assert_eq!(geocoder.queries(), vec!["Liverpool, England".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_primary_pass_preserves_order() {
        let mut geocoder = MockGeocoder::new();
        let mut records = Vec::new();
        for i in 0..20u32 {
            let name = format!("S{}", i);
            geocoder = geocoder.with(&format!("{}, X", name), i as f64, 0.0);
            records.push(stadium(i + 1, &name, "C", "X", "1"));
        }
        let stage = stage(Arc::new(geocoder)).with_concurrency(8);

        let (enriched, _) = stage.run(records).await;

        for (i, record) in enriched.iter().enumerate() {
            assert_eq!(record.rank, i as u32 + 1);
            assert_eq!(record.location, Some(Location::new(i as f64, 0.0)));
        }
    }

    #[tokio::test]
    async fn test_enricher_runs_on_spawned_task() {
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with("A, X", 1.0, 1.0)
                .with("B, X", 1.0, 1.0)
                .with("Cb, X", 2.0, 2.0),
        );
        let enricher: Arc<dyn Enricher> = Arc::new(stage(geocoder).with_concurrency(4));
        let records = vec![stadium(1, "A", "Ca", "X", "1"), stadium(2, "B", "Cb", "X", "1")];

        let (enriched, stats) = tokio::spawn(async move { enricher.enrich(records).await })
            .await
            .unwrap();

        assert_eq!(enriched[1].location, Some(Location::new(2.0, 2.0)));
        assert_eq!(stats.collisions_repaired, 1);
    }

    #[test]
    fn test_find_repeated_locations() {
        let a = Some(Location::new(1.0, 2.0));
        let b = Some(Location::new(3.0, 4.0));
        let flagged = find_repeated_locations(&[a, None, b, a, None, b, a]);
        assert_eq!(flagged, vec![3, 5, 6]);
    }

    #[test]
    fn test_coerce_capacity() {
        assert_eq!(coerce_capacity("45,000").unwrap(), 45_000);
        assert_eq!(coerce_capacity("45.000").unwrap(), 45_000);
        assert_eq!(coerce_capacity("0").unwrap(), 0);
        assert!(matches!(coerce_capacity(""), Err(PipelineError::Format { .. })));
        assert!(matches!(coerce_capacity("-5"), Err(PipelineError::Format { .. })));
    }
}
