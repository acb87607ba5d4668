use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::OutputSink;
use crate::constants::CSV_CONTENT_TYPE;
use crate::error::Result;
use crate::pipeline::processing::load::{output_object_name, render_csv};
use crate::types::StadiumRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub object_name: String,
    /// Where the sink stored the object
    pub location: String,
    pub records: usize,
    pub bytes: usize,
}

/// Use case for rendering the final record set and handing it to the sink
pub struct LoadUseCase {
    sink: Arc<dyn OutputSink>,
    file_prefix: String,
}

impl LoadUseCase {
    pub fn new(sink: Arc<dyn OutputSink>, file_prefix: impl Into<String>) -> Self {
        Self {
            sink,
            file_prefix: file_prefix.into(),
        }
    }

    pub async fn run(&self, records: &[StadiumRecord]) -> Result<LoadReport> {
        self.run_at(records, Utc::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit timestamp for the object name
    pub async fn run_at(&self, records: &[StadiumRecord], at: DateTime<Utc>) -> Result<LoadReport> {
        let bytes = render_csv(records)?;
        let object_name = output_object_name(&self.file_prefix, at);
        let size = bytes.len();

        let location = self.sink.put(&object_name, bytes, CSV_CONTENT_TYPE).await?;
        info!(object = %object_name, %location, records = records.len(), bytes = size, "wrote output");

        Ok(LoadReport {
            object_name,
            location,
            records: records.len(),
            bytes: size,
        })
    }
}
