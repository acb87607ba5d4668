use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Page retrieval failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Capacity '{value}' is not an integer: {reason}")]
    Format { value: String, reason: String },

    #[error("Output write failed for {object}: {reason}")]
    Sink { object: String, reason: String },

    #[error("Handoff error: {0}")]
    Handoff(String),

    #[error("Geocoder error: {0}")]
    Geocode(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// The independently failable units of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Transform, Stage::Load];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }

    /// Process exit code reported to the scheduler when this stage fails.
    pub fn exit_code(&self) -> i32 {
        match self {
            Stage::Extract => 2,
            Stage::Transform => 3,
            Stage::Load => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage-level failure that aborts the run.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl StageFailure {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_exit_codes_are_distinct() {
        let codes = [Stage::Extract, Stage::Transform, Stage::Load].map(|s| s.exit_code());
        assert_eq!(codes, [2, 3, 4]);
    }

    #[test]
    fn test_stage_failure_message_names_stage() {
        let failure = StageFailure::new(
            Stage::Load,
            PipelineError::Sink {
                object: "stadium_cleaned.csv".to_string(),
                reason: "403 Forbidden".to_string(),
            },
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("load stage failed"));
        assert!(msg.contains("403 Forbidden"));
    }
}
