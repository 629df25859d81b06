use crate::domain::RawRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod socrata;

/// A fetched batch of raw rows plus identification of where it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEnvelope {
    /// The source system that provided the data
    pub source_id: String,
    /// Hex-encoded sha256 over the serialized payload
    pub payload_checksum: String,
    pub record_count: usize,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<RawRecord>,
}

impl FetchEnvelope {
    pub fn new(source_id: &str, records: Vec<RawRecord>) -> Result<Self> {
        let payload = serde_json::to_vec(&records)?;
        let checksum = hex::encode(Sha256::digest(&payload));
        Ok(Self {
            source_id: source_id.to_string(),
            payload_checksum: checksum,
            record_count: records.len(),
            fetched_at: Utc::now(),
            records,
        })
    }
}

/// Core trait that all raw data sources must implement.
///
/// Transport concerns (retry, backoff, cadence) live with the
/// implementation, not with the pipeline consuming the rows.
#[async_trait]
pub trait DataSourcePort: Send + Sync {
    /// Unique identifier for this source
    fn source_id(&self) -> &'static str;

    /// Fetch every available row from this source
    async fn fetch_all(&self) -> Result<FetchEnvelope>;
}

/// Fixed in-memory source, used by tests and dry runs
pub struct StaticSource {
    pub id: &'static str,
    pub records: Vec<RawRecord>,
}

#[async_trait]
impl DataSourcePort for StaticSource {
    fn source_id(&self) -> &'static str {
        self.id
    }

    async fn fetch_all(&self) -> Result<FetchEnvelope> {
        FetchEnvelope::new(self.id, self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_envelope_checksum_is_content_addressed() {
        let a = FetchEnvelope::new("test", vec![json!({"job__": "1"})]).unwrap();
        let b = FetchEnvelope::new("test", vec![json!({"job__": "1"})]).unwrap();
        let c = FetchEnvelope::new("test", vec![json!({"job__": "2"})]).unwrap();

        assert_eq!(a.payload_checksum, b.payload_checksum);
        assert_ne!(a.payload_checksum, c.payload_checksum);
        assert_eq!(a.record_count, 1);
    }

    #[tokio::test]
    async fn test_static_source_round_trip() {
        let source = StaticSource {
            id: "fixture",
            records: vec![json!({"a": 1}), json!({"a": 2})],
        };
        let envelope = source.fetch_all().await.unwrap();
        assert_eq!(envelope.source_id, "fixture");
        assert_eq!(envelope.records.len(), 2);
    }
}
