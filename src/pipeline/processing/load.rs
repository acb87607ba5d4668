use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::types::StadiumRecord;

pub const CSV_HEADER: [&str; 10] = [
    "rank", "name", "capacity", "city", "country", "region", "tenants", "sports", "imageUrl",
    "location",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    rank: u32,
    name: &'a str,
    capacity: u64,
    city: &'a str,
    country: &'a str,
    region: &'a str,
    tenants: &'a str,
    sports: &'a str,
    image_url: &'a str,
    /// `(lat, lon)`, empty when unresolved
    location: String,
}

impl<'a> From<&'a StadiumRecord> for CsvRow<'a> {
    fn from(r: &'a StadiumRecord) -> Self {
        Self {
            rank: r.rank,
            name: &r.name,
            capacity: r.capacity,
            city: &r.city,
            country: &r.country,
            region: &r.region,
            tenants: &r.tenants,
            sports: &r.sports,
            image_url: &r.image_url,
            location: r.location.map(|l| l.to_string()).unwrap_or_default(),
        }
    }
}

/// Render records as CSV, one row per record. The header is written even when
/// there are no records.
pub fn render_csv(records: &[StadiumRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

/// `<prefix>_<YYYY-MM-DD>_<HH_MM_SS.ffffff>.csv`
pub fn output_object_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.csv",
        prefix,
        at.format("%Y-%m-%d"),
        at.format("%H_%M_%S%.6f")
    )
}
