use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

use super::{DocumentStore, StoredDocument};
use crate::error::{Error, Result};
use crate::id::DocumentId;

/// In-memory store using moka with byte-size-based eviction.
///
/// Documents only disappear when the capacity is exceeded or a retention
/// sweep removes them; nothing survives a restart.
pub struct MemoryStore {
    cache: Cache<DocumentId, StoredDocument>,
}

impl MemoryStore {
    pub fn new(max_mb: u64) -> Self {
        let max_bytes = max_mb.saturating_mul(1024 * 1024);

        let cache = Cache::builder()
            .max_capacity(max_bytes)
            .weigher(|_key: &DocumentId, value: &StoredDocument| -> u32 {
                // Weight is the content byte size, capped at u32::MAX
                value.len().try_into().unwrap_or(u32::MAX)
            })
            .build();

        Self { cache }
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bytes: Bytes, original_name: &str) -> Result<StoredDocument> {
        let doc = StoredDocument::new(bytes, original_name);
        self.cache.insert(doc.id.clone(), doc.clone()).await;
        debug!("Stored {} in memory ({} bytes)", doc.id, doc.len());
        Ok(doc)
    }

    async fn get(&self, id: &DocumentId) -> Result<StoredDocument> {
        self.cache
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn contains(&self, id: &DocumentId) -> bool {
        self.cache.contains_key(id)
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = crate::util::unix_millis();
        let expired: Vec<DocumentId> = self
            .cache
            .iter()
            .filter(|(_, doc)| doc.is_older_than(max_age, now))
            .map(|(id, _)| (*id).clone())
            .collect();

        for id in &expired {
            self.cache.invalidate(id).await;
        }

        Ok(expired.len())
    }
}
