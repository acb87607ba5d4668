use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::app::ports::OutputSink;
use crate::config::{SinkConfig, SinkKind};
use crate::error::{PipelineError, Result};

/// Sink adapter selected by `sink.kind`
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn OutputSink>> {
    Ok(match config.kind {
        SinkKind::Local => Arc::new(LocalDirSink::new(config.directory.clone())),
        SinkKind::Http => Arc::new(HttpObjectSink::new(config)?),
    })
}

/// Writes objects as files under a directory
pub struct LocalDirSink {
    directory: PathBuf,
}

impl LocalDirSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl OutputSink for LocalDirSink {
    async fn put(&self, object_name: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let sink_err = |e: std::io::Error| PipelineError::Sink {
            object: object_name.to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.directory).await.map_err(sink_err)?;
        let path = self.directory.join(object_name);
        tokio::fs::write(&path, bytes).await.map_err(sink_err)?;
        Ok(path.display().to_string())
    }
}

/// Uploads objects with `PUT {base_url}/{prefix}/{object}`.
///
/// Works against any blob store that accepts a plain PUT, e.g. an Azure container SAS URL
/// with an `x-ms-blob-type: BlockBlob` header.
pub struct HttpObjectSink {
    client: reqwest::Client,
    base_url: String,
    prefix: Option<String>,
    headers: BTreeMap<String, String>,
    query: Option<String>,
    token: Option<String>,
}

impl HttpObjectSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| PipelineError::Config("sink.base_url is required for the http sink".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url,
            prefix: config.prefix.clone(),
            headers: config.headers.clone(),
            query: config.query.clone(),
            token: config.token.clone(),
        })
    }

    /// Object URL without the query string
    pub fn object_url(&self, object_name: &str) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_string();
        if let Some(prefix) = self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            if !prefix.is_empty() {
                url.push('/');
                url.push_str(prefix);
            }
        }
        url.push('/');
        url.push_str(object_name);
        url
    }

    fn request_url(&self, object_name: &str) -> String {
        let url = self.object_url(object_name);
        match self.query.as_deref().map(|q| q.trim_start_matches('?')) {
            Some(q) if !q.is_empty() => format!("{}?{}", url, q),
            _ => url,
        }
    }
}

#[async_trait]
impl OutputSink for HttpObjectSink {
    async fn put(&self, object_name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let sink_err = |reason: String| PipelineError::Sink {
            object: object_name.to_string(),
            reason,
        };

        let mut request = self
            .client
            .put(self.request_url(object_name))
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| sink_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(sink_err(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let url = self.object_url(object_name);
        debug!(%url, %status, "object uploaded");
        Ok(url)
    }
}
