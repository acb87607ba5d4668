use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    ARCGIS_GEOCODE_URL, DEFAULT_SOURCE_URL, ENV_GEOCODER_TOKEN, ENV_SINK_DIR, ENV_SINK_TOKEN,
    ENV_SOURCE_URL, OUTPUT_FILE_PREFIX, PLACEHOLDER_IMAGE_URL,
};
use crate::error::{PipelineError, Result, Stage};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub geocoder: GeocoderConfig,
    pub enrich: EnrichConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_seconds: 10,
            user_agent: concat!("stadium_etl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    /// 0 disables the limiter
    pub requests_per_min: u64,
    /// Concurrent primary lookups; 1 keeps the pass sequential
    pub concurrency: usize,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: ARCGIS_GEOCODE_URL.to_string(),
            timeout_seconds: 10,
            max_attempts: 3,
            base_backoff_ms: 250,
            requests_per_min: 0,
            concurrency: 1,
            token: None,
        }
    }
}

/// Which record field seeds the primary geocoding query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeAnchor {
    #[default]
    StadiumName,
    City,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub placeholder_image_url: String,
    pub primary_anchor: GeocodeAnchor,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            primary_anchor: GeocodeAnchor::StadiumName,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Target directory for the local sink
    pub directory: PathBuf,
    /// Container URL for the HTTP sink, e.g. an object store bucket endpoint
    pub base_url: Option<String>,
    pub prefix: Option<String>,
    /// Extra headers sent with every upload (e.g. `x-ms-blob-type = "BlockBlob"`)
    pub headers: BTreeMap<String, String>,
    /// Appended to `base_url` as a query string, e.g. a SAS token
    pub query: Option<String>,
    pub timeout_seconds: u64,
    pub file_prefix: String,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Local,
            directory: PathBuf::from("output"),
            base_url: None,
            prefix: None,
            headers: BTreeMap::new(),
            query: None,
            timeout_seconds: 30,
            file_prefix: OUTPUT_FILE_PREFIX.to_string(),
            token: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_for_stages(path, &Stage::ALL)
    }

    /// Missing file yields the defaults; only the sections `stages` use are validated.
    pub fn load_for_stages(path: impl AsRef<Path>, stages: &[Stage]) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::read(path)?
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            let mut config = Self::default();
            config.apply_env();
            config
        };
        config.validate_for(stages)?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(url) = var(ENV_SOURCE_URL) {
            self.source.url = url;
        }
        if let Some(token) = var(ENV_GEOCODER_TOKEN) {
            self.geocoder.token = Some(token);
        }
        if let Some(token) = var(ENV_SINK_TOKEN) {
            self.sink.token = Some(token);
        }
        if let Some(dir) = var(ENV_SINK_DIR) {
            self.sink.directory = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_for(&Stage::ALL)
    }

    /// Check the sections read by `stages`: source for extract, geocoder for transform,
    /// sink for load.
    pub fn validate_for(&self, stages: &[Stage]) -> Result<()> {
        if stages.contains(&Stage::Extract) {
            if self.source.url.trim().is_empty() {
                return Err(PipelineError::Config("source.url must not be empty".into()));
            }
            if self.source.timeout_seconds == 0 {
                return Err(PipelineError::Config("source.timeout_seconds must be at least 1".into()));
            }
        }
        if stages.contains(&Stage::Transform) {
            if self.geocoder.timeout_seconds == 0 {
                return Err(PipelineError::Config("geocoder.timeout_seconds must be at least 1".into()));
            }
            if self.geocoder.max_attempts == 0 {
                return Err(PipelineError::Config("geocoder.max_attempts must be at least 1".into()));
            }
            if self.geocoder.concurrency == 0 {
                return Err(PipelineError::Config("geocoder.concurrency must be at least 1".into()));
            }
        }
        if stages.contains(&Stage::Load) && self.sink.kind == SinkKind::Http && self.sink.base_url.is_none() {
            return Err(PipelineError::Config("sink.base_url is required for the http sink".into()));
        }
        Ok(())
    }
}
