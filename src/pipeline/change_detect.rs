use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::Fingerprint;
use crate::error::Result;
use crate::observability::metrics::{emit_counter, MetricName};
use crate::storage::Storage;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Whether a destructive replace is warranted, and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeVerdict {
    pub has_changes: bool,
    pub reason: String,
    pub new_count: usize,
    pub current_count: usize,
}

/// Pick up to `cap` records: always the first and last, with evenly spaced
/// interior samples in between. Order-sensitive by construction.
fn sample_records(records: &[Value], cap: usize) -> Vec<&Value> {
    if records.len() <= cap {
        return records.iter().collect();
    }
    if cap < 2 {
        return records.iter().take(cap).collect();
    }

    let mut sampled = Vec::with_capacity(cap);
    sampled.push(&records[0]);
    let interior = cap - 2;
    let step = (records.len() - 1) as f64 / (interior + 1) as f64;
    for i in 1..=interior {
        let index = (step * i as f64) as usize;
        sampled.push(&records[index]);
    }
    sampled.push(&records[records.len() - 1]);
    sampled
}

/// FNV-1a rolling hash over the serialized sample. Used only for equality
/// comparison, never for addressing. The positional sampling caps the work
/// even when a caller hands in more rows than the cap, e.g. a storage
/// implementation that ignores its sample limit.
pub fn fingerprint(records: &[Value], cap: usize) -> Result<Fingerprint> {
    let mut hash = FNV_OFFSET_BASIS;
    for record in sample_records(records, cap) {
        let serialized = serde_json::to_string(record)?;
        for byte in serialized.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    Ok(Fingerprint(hash))
}

/// Decide whether the new record set differs from what is persisted.
///
/// Count mismatch short-circuits; otherwise fingerprints over a bounded
/// sample are compared. Any failure along the way fails open to "changed":
/// a wasted replace is preferable to serving stale data.
pub async fn detect_changes(
    storage: &dyn Storage,
    collection: &str,
    new_records: &[Value],
    sample_cap: usize,
) -> ChangeVerdict {
    emit_counter(MetricName::ChangeDetectRuns, 1.0);

    let verdict = match compare(storage, collection, new_records, sample_cap).await {
        Ok(verdict) => verdict,
        Err(e) => {
            emit_counter(MetricName::ChangeDetectFailOpens, 1.0);
            warn!(
                collection,
                error = %e,
                "Change detection failed, assuming changed"
            );
            ChangeVerdict {
                has_changes: true,
                reason: format!("change detection failed ({}), assuming changed", e),
                new_count: new_records.len(),
                current_count: 0,
            }
        }
    };

    if !verdict.has_changes {
        emit_counter(MetricName::ChangeDetectSkips, 1.0);
    }
    info!(
        collection,
        has_changes = verdict.has_changes,
        reason = %verdict.reason,
        new_count = verdict.new_count,
        current_count = verdict.current_count,
        "Change detection verdict"
    );
    verdict
}

async fn compare(
    storage: &dyn Storage,
    collection: &str,
    new_records: &[Value],
    sample_cap: usize,
) -> Result<ChangeVerdict> {
    let current_count = storage.current_count(collection).await?;
    let new_count = new_records.len();

    if current_count == 0 && new_count > 0 {
        return Ok(ChangeVerdict {
            has_changes: true,
            reason: "table is empty".to_string(),
            new_count,
            current_count,
        });
    }

    if new_count != current_count {
        return Ok(ChangeVerdict {
            has_changes: true,
            reason: format!("row count changed: {} -> {}", current_count, new_count),
            new_count,
            current_count,
        });
    }

    // The stored side is the collection's first `sample_cap` rows, so the
    // new side must be bounded to the same positions before hashing or
    // identical over-cap collections would never fingerprint equal
    let current_sample = storage.sample(collection, sample_cap).await?;
    let bounded_new = &new_records[..new_records.len().min(sample_cap)];
    let new_fingerprint = fingerprint(bounded_new, sample_cap)?;
    let current_fingerprint = fingerprint(&current_sample, sample_cap)?;

    if new_fingerprint != current_fingerprint {
        return Ok(ChangeVerdict {
            has_changes: true,
            reason: "content fingerprint mismatch".to_string(),
            new_count,
            current_count,
        });
    }

    Ok(ChangeVerdict {
        has_changes: false,
        reason: "count and fingerprint match".to_string(),
        new_count,
        current_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"job_id": i, "units": i * 2})).collect()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint(&rows(50), 1000).unwrap();
        let b = fingerprint(&rows(50), 1000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let forward = rows(10);
        let mut reversed = rows(10);
        reversed.reverse();
        assert_ne!(
            fingerprint(&forward, 1000).unwrap(),
            fingerprint(&reversed, 1000).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_sees_single_field_change() {
        let original = rows(10);
        let mut modified = rows(10);
        modified[4]["units"] = json!(9999);
        assert_ne!(
            fingerprint(&original, 1000).unwrap(),
            fingerprint(&modified, 1000).unwrap()
        );
    }

    #[test]
    fn test_sampling_keeps_first_and_last() {
        let records = rows(5000);
        let sampled = sample_records(&records, 1000);
        assert_eq!(sampled.len(), 1000);
        assert_eq!(*sampled[0], records[0]);
        assert_eq!(*sampled[999], records[4999]);
    }

    #[tokio::test]
    async fn test_empty_store_reports_table_empty() {
        let storage = InMemoryStorage::new();
        let verdict = detect_changes(&storage, "buildings", &rows(10), 1000).await;
        assert!(verdict.has_changes);
        assert_eq!(verdict.reason, "table is empty");
    }

    #[tokio::test]
    async fn test_identical_content_is_unchanged() {
        let storage = InMemoryStorage::new();
        storage.replace("buildings", rows(10)).await.unwrap();

        let verdict = detect_changes(&storage, "buildings", &rows(10), 1000).await;
        assert!(!verdict.has_changes);
        assert_eq!(verdict.new_count, 10);
        assert_eq!(verdict.current_count, 10);
    }

    #[tokio::test]
    async fn test_count_change_short_circuits() {
        let storage = InMemoryStorage::new();
        storage.replace("buildings", rows(10)).await.unwrap();

        let verdict = detect_changes(&storage, "buildings", &rows(11), 1000).await;
        assert!(verdict.has_changes);
        assert!(verdict.reason.contains("row count changed"));
    }

    #[tokio::test]
    async fn test_identical_sets_larger_than_sample_cap_are_unchanged() {
        let storage = InMemoryStorage::new();
        storage.replace("buildings", rows(1500)).await.unwrap();

        let verdict = detect_changes(&storage, "buildings", &rows(1500), 1000).await;
        assert!(!verdict.has_changes, "{}", verdict.reason);
        assert_eq!(verdict.new_count, 1500);
        assert_eq!(verdict.current_count, 1500);
    }

    #[tokio::test]
    async fn test_change_within_sample_window_detected_past_cap() {
        let storage = InMemoryStorage::new();
        storage.replace("buildings", rows(1500)).await.unwrap();

        let mut modified = rows(1500);
        modified[500]["units"] = json!(-1);
        let verdict = detect_changes(&storage, "buildings", &modified, 1000).await;
        assert!(verdict.has_changes);
        assert_eq!(verdict.reason, "content fingerprint mismatch");
    }

    #[tokio::test]
    async fn test_same_count_different_content_hashes_differently() {
        let storage = InMemoryStorage::new();
        storage.replace("buildings", rows(10)).await.unwrap();

        let mut modified = rows(10);
        modified[7]["units"] = json!(-1);
        let verdict = detect_changes(&storage, "buildings", &modified, 1000).await;
        assert!(verdict.has_changes);
        assert_eq!(verdict.reason, "content fingerprint mismatch");
    }

    struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        async fn current_count(&self, _collection: &str) -> crate::error::Result<usize> {
            Err(PipelineError::Storage {
                message: "connection refused".to_string(),
            })
        }

        async fn sample(
            &self,
            _collection: &str,
            _limit: usize,
        ) -> crate::error::Result<Vec<Value>> {
            Err(PipelineError::Storage {
                message: "connection refused".to_string(),
            })
        }

        async fn replace(
            &self,
            _collection: &str,
            _records: Vec<Value>,
        ) -> crate::error::Result<()> {
            Err(PipelineError::Storage {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_storage_failure_fails_open_to_changed() {
        let verdict = detect_changes(&BrokenStorage, "buildings", &rows(10), 1000).await;
        assert!(verdict.has_changes);
        assert!(verdict.reason.contains("assuming changed"));
    }
}
