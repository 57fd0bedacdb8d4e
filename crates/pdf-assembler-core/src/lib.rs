//! PDF Assembler Core Library
//!
//! This library provides the core functionality for assembling PDF documents:
//! - A document store mapping opaque ids to immutable PDF blobs
//! - Merge-order resolution against client-supplied file lists
//! - Page concatenation across documents
//! - Page number overlays

pub mod config;
pub mod error;
pub mod id;
pub mod order;
pub mod pdf;
pub mod store;
pub mod util;

pub use config::{AppConfig, StoreBackend, StoreConfig, UploadConfig};
pub use error::{Error, ErrorKind, Result};
pub use id::DocumentId;
pub use order::{DocumentRef, resolve_order};
pub use pdf::{PageCollection, PageNumberOverlay, PdfDocument, merge_pdfs, number_pages};
pub use store::{DiskStore, DocumentStore, MemoryStore, StoredDocument, create_store};

use bytes::Bytes;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// The only media type accepted at ingestion.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// File name given to merge results.
pub const MERGED_NAME: &str = "merged.pdf";

/// Whether a declared media type is PDF (parameters such as `charset` are ignored).
pub fn is_pdf_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

/// High-level processor: every operation reads from and writes to the store,
/// and every transformation produces a new document.
pub struct DocumentProcessor {
    store: Arc<dyn DocumentStore>,
}

impl DocumentProcessor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create with a store built from configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(create_store(config)?))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Accept an uploaded file. Non-PDF media types are rejected before the
    /// store is touched.
    pub async fn ingest(
        &self,
        bytes: Bytes,
        original_name: &str,
        media_type: &str,
    ) -> Result<StoredDocument> {
        if !is_pdf_media_type(media_type) {
            return Err(Error::InvalidInput(format!(
                "{original_name}: only PDF files are allowed (got {media_type})"
            )));
        }

        let doc = self.store.put(bytes, original_name).await?;
        info!("Stored upload {} as {} ({} bytes)", original_name, doc.id, doc.len());
        Ok(doc)
    }

    /// Merge the documents selected by `order` (or all `files`, in list order)
    /// into a new document.
    pub async fn merge(
        &self,
        files: &[DocumentRef],
        order: Option<&[String]>,
    ) -> Result<StoredDocument> {
        if files.is_empty() {
            return Err(Error::InvalidInput("No files provided".to_string()));
        }

        let resolved = resolve_order(files, order);
        if resolved.is_empty() {
            return Err(Error::InvalidInput(
                "None of the ordered ids match a supplied file".to_string(),
            ));
        }

        let ids = resolved
            .iter()
            .map(|file| DocumentId::parse(&file.id))
            .collect::<Result<Vec<_>>>()?;

        // Fetch concurrently; try_join_all keeps input order
        let sources = try_join_all(ids.iter().map(|id| self.store.get(id))).await?;
        debug!("Loaded {} sources for merge", sources.len());

        let source_count = sources.len();
        let merged = tokio::task::spawn_blocking(move || {
            let named: Vec<(&str, &[u8])> = sources
                .iter()
                .map(|doc| (doc.original_name.as_str(), doc.bytes.as_ref()))
                .collect();
            merge_pdfs(&named)
        })
        .await
        .map_err(|e| processing_failed(&e))??;

        let doc = self.store.put(Bytes::from(merged), MERGED_NAME).await?;
        info!("Merged {} documents into {}", source_count, doc.id);
        Ok(doc)
    }

    /// Overlay `"{n} / {total}"` page numbers onto a stored document, storing
    /// the result as a new document.
    pub async fn number_pages(&self, id: &str) -> Result<StoredDocument> {
        let source = self.fetch(id).await?;
        let name = format!("numbered-{}", source.original_name);

        let bytes = source.bytes;
        let numbered = tokio::task::spawn_blocking(move || number_pages(&bytes))
            .await
            .map_err(|e| processing_failed(&e))??;

        let doc = self.store.put(Bytes::from(numbered), &name).await?;
        info!("Numbered pages of {} into {}", source.id, doc.id);
        Ok(doc)
    }

    /// Look up a stored document by an untrusted id.
    pub async fn fetch(&self, id: &str) -> Result<StoredDocument> {
        let id = DocumentId::parse(id)?;
        self.store.get(&id).await
    }
}

fn processing_failed(e: &tokio::task::JoinError) -> Error {
    Error::MalformedDocument(format!("PDF processing task failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_media_type() {
        assert!(is_pdf_media_type("application/pdf"));
        assert!(is_pdf_media_type("Application/PDF; charset=binary"));
        assert!(!is_pdf_media_type("application/octet-stream"));
        assert!(!is_pdf_media_type("text/plain"));
        assert!(!is_pdf_media_type(""));
    }
}
