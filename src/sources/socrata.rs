use crate::domain::RawRecord;
use crate::error::{PipelineError, Result};
use crate::observability::metrics::{emit_counter, MetricName};
use crate::sources::{DataSourcePort, FetchEnvelope};
use async_trait::async_trait;
use tracing::{debug, info};

/// Page size for Socrata-style `$limit`/`$offset` pagination
const PAGE_SIZE: usize = 50_000;

/// Fetches a Socrata open-data resource page by page until exhausted.
/// Retry and backoff are deliberately absent; callers own those policies.
pub struct SocrataSource {
    id: &'static str,
    endpoint: String,
    client: reqwest::Client,
}

impl SocrataSource {
    pub fn new(id: &'static str, endpoint: &str) -> Self {
        Self {
            id,
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DataSourcePort for SocrataSource {
    fn source_id(&self) -> &'static str {
        self.id
    }

    async fn fetch_all(&self) -> Result<FetchEnvelope> {
        let mut all_records: Vec<RawRecord> = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!(
                "{}?$limit={}&$offset={}",
                self.endpoint, PAGE_SIZE, offset
            );
            debug!("Fetching page from {}", url);

            let response = self.client.get(&url).send().await?.error_for_status()?;
            let body = response.bytes().await?;
            emit_counter(MetricName::SourcesPayloadBytes, body.len() as f64);

            let page: serde_json::Value = serde_json::from_slice(&body)?;
            let rows = page.as_array().ok_or_else(|| {
                PipelineError::MalformedPayload(format!(
                    "source '{}' returned a non-array page",
                    self.id
                ))
            })?;

            let fetched = rows.len();
            all_records.extend(rows.iter().cloned());
            offset += fetched;

            if fetched < PAGE_SIZE {
                break;
            }
        }

        emit_counter(MetricName::SourcesRecordsFetched, all_records.len() as f64);
        let envelope = FetchEnvelope::new(self.id, all_records)?;
        info!(
            source = self.id,
            records = envelope.record_count,
            checksum = %envelope.payload_checksum,
            "Source fetch complete"
        );
        Ok(envelope)
    }
}
