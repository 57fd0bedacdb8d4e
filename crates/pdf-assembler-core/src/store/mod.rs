//! Document store: maps opaque identifiers to immutable PDF blobs.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::id::DocumentId;

/// An immutable document held by a [`DocumentStore`].
///
/// Cloning is cheap: the content is a reference-counted [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub bytes: Bytes,
    /// File name presented on download
    pub original_name: String,
    /// MD5 hex digest of `bytes`
    pub checksum: String,
    pub created_at_ms: u64,
}

impl StoredDocument {
    /// Build a new document value with a freshly generated id.
    pub fn new(bytes: Bytes, original_name: impl Into<String>) -> Self {
        let original_name = original_name.into();
        Self {
            id: DocumentId::generate(&original_name),
            checksum: format!("{:x}", md5::compute(&bytes)),
            bytes,
            original_name,
            created_at_ms: crate::util::unix_millis(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the document is older than `max_age` at `now_ms`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn is_older_than(&self, max_age: Duration, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > max_age.as_millis() as u64
    }
}

/// Keyed blob storage for PDF documents.
///
/// Implementations must be safe for concurrent `put`/`get`: a reader never
/// observes a partially written document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name, for logs and the health endpoint
    fn name(&self) -> &'static str;

    /// Store `bytes` under a fresh identifier.
    async fn put(&self, bytes: Bytes, original_name: &str) -> Result<StoredDocument>;

    /// Fetch a document; `NotFound` if the id is unknown.
    async fn get(&self, id: &DocumentId) -> Result<StoredDocument>;

    async fn contains(&self, id: &DocumentId) -> bool {
        self.get(id).await.is_ok()
    }

    /// Remove documents created more than `max_age` ago.
    ///
    /// Returns the number of documents removed.
    async fn purge_older_than(&self, max_age: Duration) -> Result<usize>;
}

/// Create a document store from configuration
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Disk => Arc::new(DiskStore::new(config.resolved_path())?),
        StoreBackend::Memory => Arc::new(MemoryStore::new(config.memory_max_mb)),
    };

    Ok(store)
}
