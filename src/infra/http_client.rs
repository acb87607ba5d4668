use async_trait::async_trait;
use std::time::Duration;

use crate::app::ports::PageSource;
use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};

pub struct ReqwestPageSource {
    client: reqwest::Client,
}

impl ReqwestPageSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for ReqwestPageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let fetch_err = |reason: String| PipelineError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }
        let body = resp.text().await.map_err(|e| fetch_err(e.to_string()))?;
        if body.trim().is_empty() {
            return Err(fetch_err("empty response body".to_string()));
        }
        Ok(body)
    }
}
