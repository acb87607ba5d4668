//! Values shared by the extract, transform and load stages.

// Source page
pub const DEFAULT_SOURCE_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_association_football_stadiums_by_capacity";
pub const WIKITABLE_SELECTOR: &str = "table.wikitable";

// Extraction defaults for cells missing from a row
pub const MISSING_TEXT: &str = "N/A";
pub const MISSING_CAPACITY: &str = "0";
pub const NO_IMAGE: &str = "NO_IMAGE";
pub const CELLS_PER_ROW: usize = 8;

// Enrichment
pub const PLACEHOLDER_IMAGE_URL: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/0/0a/No-image-available.png/480px-No-image-available.png";

// Geocoding
pub const ARCGIS_GEOCODE_URL: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

// Load
pub const OUTPUT_FILE_PREFIX: &str = "stadium_cleaned";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

// Environment overrides
pub const ENV_SOURCE_URL: &str = "STADIUM_SOURCE_URL";
pub const ENV_GEOCODER_TOKEN: &str = "STADIUM_GEOCODER_TOKEN";
pub const ENV_SINK_TOKEN: &str = "STADIUM_SINK_TOKEN";
pub const ENV_SINK_DIR: &str = "STADIUM_SINK_DIR";
pub const ENV_METRICS_PORT: &str = "STADIUM_METRICS_PORT";
