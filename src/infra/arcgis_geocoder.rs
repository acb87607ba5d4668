use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::error::{PipelineError, Result};
use crate::infra::rate_limiter::RateLimiter;
use crate::pipeline::processing::geocode::Geocoder;
use crate::types::Location;

const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Debug, Deserialize)]
struct FindCandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    location: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Result of a single request to the provider
#[derive(Debug)]
enum Attempt {
    Done(Option<Location>),
    /// Transport error, 429 or 5xx
    Retryable(String),
    Fatal(String),
}

/// ArcGIS World Geocoding `findAddressCandidates` client
pub struct ArcGisGeocoder {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    max_attempts: u32,
    base_backoff: Duration,
    limiter: RateLimiter,
}

impl ArcGisGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            limiter: RateLimiter::new(config.requests_per_min),
        })
    }

    async fn attempt(&self, query: &str) -> Attempt {
        self.limiter.acquire().await;

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("SingleLine", query), ("f", "json"), ("maxLocations", "1")]);
        if let Some(token) = &self.token {
            request = request.query(&[("token", token.as_str())]);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return Attempt::Retryable(e.to_string()),
        };
        let status = resp.status();
        if is_retryable_status(status) {
            return Attempt::Retryable(format!("HTTP {}", status));
        }
        if !status.is_success() {
            return Attempt::Fatal(format!("HTTP {}", status));
        }
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Retryable(e.to_string()),
        };
        match parse_candidates(&body) {
            Ok(location) => Attempt::Done(location),
            Err(e) => Attempt::Fatal(e.to_string()),
        }
    }
}

#[async_trait]
impl Geocoder for ArcGisGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Location>> {
        with_retries(self.max_attempts, self.base_backoff, || self.attempt(query)).await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// First candidate's coordinates; the service reports `x` as longitude and `y` as latitude
fn parse_candidates(body: &str) -> Result<Option<Location>> {
    let response: FindCandidatesResponse = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        return Err(PipelineError::Geocode(format!(
            "service error {}: {}",
            err.code, err.message
        )));
    }
    Ok(response
        .candidates
        .first()
        .map(|c| Location::new(c.location.y, c.location.x)))
}

/// Exponential backoff with up to one base interval of random jitter
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let base_ms = base.as_millis() as u64;
    let jitter_ms = if base_ms > 0 {
        rand::thread_rng().gen_range(0..base_ms)
    } else {
        0
    };
    Duration::from_millis(
        base_ms
            .saturating_mul(1 << exponent)
            .saturating_add(jitter_ms),
    )
}

async fn with_retries<F, Fut>(max_attempts: u32, base: Duration, mut op: F) -> Result<Option<Location>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Attempt::Done(location) => return Ok(location),
            Attempt::Fatal(reason) => return Err(PipelineError::Geocode(reason)),
            Attempt::Retryable(reason) if attempt < max_attempts => {
                let delay = backoff_delay(base, attempt);
                warn!(attempt, %reason, "geocoding request failed; retrying after {:?}", delay);
                sleep(delay).await;
            }
            Attempt::Retryable(reason) => {
                debug!(attempt, %reason, "geocoding retries exhausted");
                return Err(PipelineError::Geocode(format!(
                    "gave up after {} attempts: {}",
                    attempt, reason
                )));
            }
        }
    }
}
