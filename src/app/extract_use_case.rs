use std::sync::Arc;
use tracing::info;

use crate::app::ports::PageSource;
use crate::error::Result;
use crate::pipeline::processing::extract::{ExtractStats, TableExtractor};
use crate::types::ExtractedStadium;

/// Use case for fetching the source page and pulling stadium rows out of it
pub struct ExtractUseCase {
    source: Arc<dyn PageSource>,
    extractor: TableExtractor,
    url: String,
}

impl ExtractUseCase {
    pub fn new(source: Arc<dyn PageSource>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            source,
            extractor: TableExtractor::new(url.clone()),
            url,
        }
    }

    /// A fetch failure is returned before any parsing happens
    pub async fn run(&self) -> Result<(Vec<ExtractedStadium>, ExtractStats)> {
        let html = self.source.fetch(&self.url).await?;
        info!(url = %self.url, bytes = html.len(), "fetched source page");
        self.extractor.extract_with_stats(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockPageSource {
        body: Option<String>,
        requested: Mutex<Vec<String>>,
    }

    impl MockPageSource {
        fn serving(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                body: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageSource for MockPageSource {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.body.clone().ok_or_else(|| PipelineError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    const PAGE: &str = r#"<html><body><table class="wikitable">
        <tr><th>Stadium</th><th>Capacity</th></tr>
        <tr><td>Camp Nou</td><td>99,354</td><td>Barcelona</td><td>Spain</td>
            <td>Europe</td><td>FC Barcelona</td><td>Football</td><td></td></tr>
        </table></body></html>"#;

    #[tokio::test]
    async fn test_fetches_configured_url_and_extracts() {
        let source = Arc::new(MockPageSource::serving(PAGE));
        let use_case = ExtractUseCase::new(source.clone(), "https://example.org/list");

        let (records, stats) = use_case.run().await.unwrap();

        assert_eq!(
            *source.requested.lock().unwrap(),
            vec!["https://example.org/list".to_string()]
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Camp Nou");
        assert_eq!(records[0].capacity, "99354");
        assert_eq!(stats.tables, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_surfaced() {
        let use_case =
            ExtractUseCase::new(Arc::new(MockPageSource::unreachable()), "https://example.org/list");

        let err = use_case.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
