use async_trait::async_trait;

use crate::error::Result;

/// Source of the raw HTML page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Destination for the rendered output file
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Stores `bytes` under `object_name` and returns where it landed
    async fn put(&self, object_name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
