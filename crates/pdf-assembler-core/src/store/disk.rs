//! Directory-backed document store.
//!
//! Layout is flat: every document is `{id}.pdf` plus a `{id}.json` metadata
//! sidecar in the store root. Both files are written to a temp file in the
//! same directory and renamed into place, metadata first, so a blob is only
//! ever visible once it is complete.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{DocumentStore, StoredDocument};
use crate::error::{Error, Result};
use crate::id::DocumentId;

const BLOB_EXT: &str = "pdf";
const META_EXT: &str = "json";

/// Sidecar metadata persisted next to each blob.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentMeta {
    original_name: String,
    checksum: String,
    created_at_ms: u64,
    size: usize,
}

/// Disk-based store rooted at a single directory
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            Error::StorageFailure(format!(
                "Failed to create store directory {}: {}",
                root.display(),
                e
            ))
        })?;

        debug!("Opened disk store at {}", root.display());

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Path generation (ids are validated, so a join cannot escape the root)
    // =========================================================================

    fn blob_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("{id}.{BLOB_EXT}"))
    }

    fn meta_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("{id}.{META_EXT}"))
    }

    // =========================================================================
    // Blocking I/O, run via spawn_blocking
    // =========================================================================

    fn write_atomic(root: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn put_blocking(root: &Path, blob: &Path, meta: &Path, doc: &StoredDocument) -> Result<()> {
        let sidecar = DocumentMeta {
            original_name: doc.original_name.clone(),
            checksum: doc.checksum.clone(),
            created_at_ms: doc.created_at_ms,
            size: doc.len(),
        };
        let sidecar = serde_json::to_vec(&sidecar)
            .map_err(|e| Error::StorageFailure(format!("Failed to encode metadata: {e}")))?;

        Self::write_atomic(root, meta, &sidecar).map_err(|e| {
            Error::StorageFailure(format!("Failed to write {}: {}", meta.display(), e))
        })?;
        if let Err(e) = Self::write_atomic(root, blob, &doc.bytes) {
            // A sidecar without its blob must not outlive the failed write
            if let Err(cleanup) = std::fs::remove_file(meta) {
                warn!("Failed to remove {}: {}", meta.display(), cleanup);
            }
            return Err(Error::StorageFailure(format!(
                "Failed to write {}: {}",
                blob.display(),
                e
            )));
        }

        Ok(())
    }

    fn get_blocking(id: DocumentId, blob: &Path, meta: &Path) -> Result<StoredDocument> {
        let bytes = match std::fs::read(blob) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()));
            }
            Err(e) => {
                return Err(Error::StorageFailure(format!(
                    "Failed to read {}: {}",
                    blob.display(),
                    e
                )));
            }
        };

        let sidecar = std::fs::read(meta)
            .ok()
            .and_then(|raw| serde_json::from_slice::<DocumentMeta>(&raw).ok());

        let doc = match sidecar {
            Some(m) => StoredDocument {
                id,
                bytes,
                original_name: m.original_name,
                checksum: m.checksum,
                created_at_ms: m.created_at_ms,
            },
            None => {
                warn!("Missing metadata for {}, using defaults", id);
                StoredDocument {
                    original_name: format!("{id}.{BLOB_EXT}"),
                    checksum: format!("{:x}", md5::compute(&bytes)),
                    created_at_ms: modified_millis(blob).unwrap_or(0),
                    id,
                    bytes,
                }
            }
        };

        Ok(doc)
    }

    fn purge_blocking(root: &Path, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let entries = std::fs::read_dir(root).map_err(|e| {
            Error::StorageFailure(format!("Failed to list {}: {}", root.display(), e))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if ext != BLOB_EXT && ext != META_EXT {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if !expired {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) if ext == BLOB_EXT => removed += 1,
                Ok(()) => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }
}

fn modified_millis(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    u64::try_from(since_epoch.as_millis()).ok()
}

fn join_error(e: &tokio::task::JoinError) -> Error {
    Error::StorageFailure(format!("Store task failed: {e}"))
}

#[async_trait]
impl DocumentStore for DiskStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn put(&self, bytes: Bytes, original_name: &str) -> Result<StoredDocument> {
        let doc = StoredDocument::new(bytes, original_name);
        let root = self.root.clone();
        let blob = self.blob_path(&doc.id);
        let meta = self.meta_path(&doc.id);

        let stored = doc.clone();
        tokio::task::spawn_blocking(move || Self::put_blocking(&root, &blob, &meta, &stored))
            .await
            .map_err(|e| join_error(&e))??;

        debug!("Stored {} on disk ({} bytes)", doc.id, doc.len());
        Ok(doc)
    }

    async fn get(&self, id: &DocumentId) -> Result<StoredDocument> {
        let blob = self.blob_path(id);
        let meta = self.meta_path(id);
        let id = id.clone();

        tokio::task::spawn_blocking(move || Self::get_blocking(id, &blob, &meta))
            .await
            .map_err(|e| join_error(&e))?
    }

    async fn contains(&self, id: &DocumentId) -> bool {
        tokio::fs::try_exists(self.blob_path(id))
            .await
            .unwrap_or(false)
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::purge_blocking(&root, max_age))
            .await
            .map_err(|e| join_error(&e))?
    }
}
