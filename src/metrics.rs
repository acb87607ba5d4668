use std::net::SocketAddr;

use crate::constants::ENV_METRICS_PORT;

/// Installs the Prometheus exporter when `STADIUM_METRICS_PORT` is set.
/// Without it the `metrics` macros are no-ops.
pub fn init_metrics() {
    let port: u16 = match std::env::var(ENV_METRICS_PORT)
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(p) => p,
        None => return,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub mod names {
    pub const RECORDS_EXTRACTED: &str = "stadium_records_extracted_total";
    pub const PARSE_DEFECTS: &str = "stadium_parse_defects_total";
    pub const GEOCODE_LOOKUPS: &str = "stadium_geocode_lookups_total";
    pub const LOCATION_COLLISIONS: &str = "stadium_location_collisions_total";
    pub const CAPACITY_FORMAT_ERRORS: &str = "stadium_capacity_format_errors_total";
    pub const STAGE_DURATION: &str = "stadium_stage_duration_seconds";
    pub const RUNS: &str = "stadium_pipeline_runs_total";
}

#[cfg(test)]
mod tests {
    use super::names::{PARSE_DEFECTS, RECORDS_EXTRACTED};
    use crate::pipeline::processing::extract::TableExtractor;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_stage_counters_reach_prometheus_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let html = r#"<table class="wikitable">
            <tr><th>Stadium</th><th>Capacity</th></tr>
            <tr><td>Wembley Stadium</td><td>90,000</td></tr>
            </table>"#;

        ::metrics::with_local_recorder(&recorder, || {
            TableExtractor::new("test").extract(html).unwrap();
        });

        let rendered = handle.render();
        assert!(rendered.contains(RECORDS_EXTRACTED), "rendered: {}", rendered);
        assert!(rendered.contains(PARSE_DEFECTS), "rendered: {}", rendered);
    }
}
