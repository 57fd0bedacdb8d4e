//! HTTP route handlers for the PDF assembler web API.
//!
//! All routes return JSON except downloads, which stream the stored PDF.

mod download;
mod health;
mod merge;
mod numbering;
mod upload;

pub use download::download_pdf;
pub use health::health;
pub use merge::merge_pdfs;
pub use numbering::add_page_numbers;
pub use upload::upload_pdfs;

use pdf_assembler_core::{DocumentRef, StoredDocument};
use serde::{Deserialize, Serialize};

/// A stored document as reported to clients.
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub filename: String,
    /// Download URL
    pub path: String,
}

impl From<&StoredDocument> for FileInfo {
    fn from(doc: &StoredDocument) -> Self {
        Self {
            id: doc.id.to_string(),
            filename: doc.original_name.clone(),
            path: format!("/api/download/{}", doc.id),
        }
    }
}

/// An upload that was not stored.
#[derive(Debug, Serialize)]
pub struct RejectedFile {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<FileInfo>,
    pub rejected: Vec<RejectedFile>,
}

/// Response for operations that produce one new document.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub success: bool,
    pub file: FileInfo,
}

impl From<&StoredDocument> for FileResponse {
    fn from(doc: &StoredDocument) -> Self {
        Self {
            success: true,
            file: FileInfo::from(doc),
        }
    }
}

/// Body of `POST /api/merge`.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub files: Vec<DocumentRef>,
    /// Authoritative merge order; the file list order is used when absent
    #[serde(default)]
    pub order: Option<Vec<String>>,
}

/// Body of `POST /api/add-page-numbers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberRequest {
    #[serde(default)]
    pub file_id: Option<String>,
}
