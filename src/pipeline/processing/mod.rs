// Stage logic: text cleaning, table extraction, geocoding, enrichment, CSV rendering

pub mod enrich;
pub mod extract;
pub mod geocode;
pub mod load;
pub mod text;
