use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Storage collaborator for canonical record collections.
///
/// `replace` is a clear-then-bulk-insert and is assumed atomic by the
/// implementation; this core never performs partial updates.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Current number of rows in a collection
    async fn current_count(&self, collection: &str) -> Result<usize>;

    /// Up to `limit` rows from a collection, in insertion order
    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Value>>;

    /// Atomically clear a collection and insert the given rows
    async fn replace(&self, collection: &str, records: Vec<Value>) -> Result<()>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    collections: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>>> {
        self.collections.lock().map_err(|e| PipelineError::Storage {
            message: format!("storage lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn current_count(&self, collection: &str) -> Result<usize> {
        let collections = self.lock()?;
        Ok(collections.get(collection).map(|rows| rows.len()).unwrap_or(0))
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Value>> {
        let collections = self.lock()?;
        let rows = collections.get(collection).cloned().unwrap_or_default();
        Ok(rows.into_iter().take(limit).collect())
    }

    async fn replace(&self, collection: &str, records: Vec<Value>) -> Result<()> {
        let mut collections = self.lock()?;
        let count = records.len();
        collections.insert(collection.to_string(), records);

        debug!("Replaced collection '{}' with {} rows", collection, count);
        Ok(())
    }
}
