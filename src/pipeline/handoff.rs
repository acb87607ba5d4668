use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PipelineError, Result, Stage};
use crate::types::{ExtractedStadium, StadiumRecord};

/// Typed message carrying one stage's output to the next stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff<T> {
    pub run_id: Uuid,
    /// Stage that produced the records
    pub stage: String,
    pub produced_at: DateTime<Utc>,
    pub records: Vec<T>,
}

/// Envelope fields readable without knowing the record type
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandoffHeader {
    stage: String,
}

pub type ExtractHandoff = Handoff<ExtractedStadium>;
pub type TransformHandoff = Handoff<StadiumRecord>;

impl<T> Handoff<T> {
    pub fn new(run_id: Uuid, stage: Stage, records: Vec<T>) -> Self {
        Self {
            run_id,
            stage: stage.as_str().to_string(),
            produced_at: Utc::now(),
            records,
        }
    }

    /// Reject envelopes produced by a different stage than the consumer expects
    pub fn expect_stage(self, stage: Stage) -> Result<Self> {
        if self.stage != stage.as_str() {
            return Err(PipelineError::Handoff(format!(
                "expected records from the {} stage, got '{}'",
                stage, self.stage
            )));
        }
        Ok(self)
    }
}

impl<T: Serialize> Handoff<T> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(
            path = %path.display(),
            records = self.records.len(),
            stage = %self.stage,
            "wrote handoff"
        );
        Ok(())
    }
}

impl<T: DeserializeOwned> Handoff<T> {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let handoff = Self::from_json(&read_envelope(path)?)?;
        debug!(path = %path.display(), stage = %handoff.stage, "read handoff");
        Ok(handoff)
    }

    /// Read an envelope produced by `stage`. The stage is checked before the records
    /// are decoded, so another stage's envelope is a `Handoff` error.
    pub fn read_stage(path: &Path, stage: Stage) -> Result<Self> {
        let content = read_envelope(path)?;
        let header: HandoffHeader = serde_json::from_str(&content)?;
        if header.stage != stage.as_str() {
            return Err(PipelineError::Handoff(format!(
                "{} holds records from the '{}' stage, expected {}",
                path.display(),
                header.stage,
                stage
            )));
        }
        let handoff = Self::from_json(&content)?;
        debug!(path = %path.display(), stage = %handoff.stage, "read handoff");
        Ok(handoff)
    }
}

fn read_envelope(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| PipelineError::Handoff(format!("cannot read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn records() -> Vec<StadiumRecord> {
        vec![
            StadiumRecord {
                rank: 1,
                name: "Narendra Modi Stadium".to_string(),
                capacity: 132_000,
                city: "Ahmedabad".to_string(),
                country: "India".to_string(),
                region: "South Asia".to_string(),
                tenants: "India national cricket team".to_string(),
                sports: "Cricket".to_string(),
                image_url: "https://upload.wikimedia.org/m.jpg".to_string(),
                location: Some(Location::new(23.0918, 72.5975)),
            },
            StadiumRecord {
                rank: 2,
                name: "Rungrado 1st of May Stadium".to_string(),
                capacity: 114_000,
                city: "Pyongyang".to_string(),
                country: "North Korea".to_string(),
                region: "East Asia".to_string(),
                tenants: "N/A".to_string(),
                sports: "N/A".to_string(),
                image_url: "https://upload.wikimedia.org/r.jpg".to_string(),
                location: None,
            },
        ]
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let handoff = Handoff::new(Uuid::new_v4(), Stage::Transform, records());

        let json = handoff.to_json().unwrap();
        let back: TransformHandoff = Handoff::from_json(&json).unwrap();

        assert_eq!(back, handoff);
    }

    #[test]
    fn test_envelope_is_self_describing() {
        let handoff = Handoff::new(Uuid::nil(), Stage::Transform, records());
        let value: serde_json::Value = serde_json::from_str(&handoff.to_json().unwrap()).unwrap();

        assert_eq!(value["stage"], "transform");
        assert_eq!(value["records"][0]["location"], serde_json::json!([23.0918, 72.5975]));
        assert!(value["records"][1]["location"].is_null());
        assert_eq!(value["records"][1]["imageUrl"], "https://upload.wikimedia.org/r.jpg");
    }

    #[test]
    fn test_file_round_trip_and_stage_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff").join("transform.json");
        let handoff = Handoff::new(Uuid::new_v4(), Stage::Transform, records());

        handoff.write_to(&path).unwrap();
        let back = TransformHandoff::read_from(&path).unwrap();

        assert_eq!(back.records, handoff.records);
        assert!(back.clone().expect_stage(Stage::Transform).is_ok());
        assert!(matches!(
            back.expect_stage(Stage::Extract),
            Err(PipelineError::Handoff(_))
        ));
    }

    #[test]
    fn test_other_stage_envelope_rejected_before_decoding_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.json");
        let extracted = vec![ExtractedStadium {
            rank: 1,
            name: "Camp Nou".to_string(),
            capacity: "99354".to_string(),
            city: "Barcelona".to_string(),
            country: "Spain".to_string(),
            region: "Europe".to_string(),
            tenants: "FC Barcelona".to_string(),
            sports: "Football".to_string(),
            image_url: "NO_IMAGE".to_string(),
        }];
        Handoff::new(Uuid::new_v4(), Stage::Extract, extracted.clone())
            .write_to(&path)
            .unwrap();

        let err = TransformHandoff::read_stage(&path, Stage::Transform).unwrap_err();
        assert!(matches!(err, PipelineError::Handoff(_)));

        let back = ExtractHandoff::read_stage(&path, Stage::Extract).unwrap();
        assert_eq!(back.records, extracted);
    }

    #[test]
    fn test_missing_file_is_handoff_error() {
        let err = ExtractHandoff::read_from(Path::new("/nope/extract.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Handoff(_)));
    }
}
