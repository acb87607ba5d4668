pub mod arcgis_geocoder;
pub mod http_client;
pub mod rate_limiter;
pub mod sink;
