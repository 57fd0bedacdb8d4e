//! Upload route - PDF file upload handling.

use axum::{Json, extract::State};
use axum_extra::extract::Multipart;
use pdf_assembler_core::ErrorKind;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{FileInfo, RejectedFile, UploadResponse};
use crate::helpers::{ApiError, ResultExt, RouteResult};
use crate::state::AppState;

/// Multipart field carrying the files.
pub const UPLOAD_FIELD: &str = "pdfs";

/// Store every uploaded PDF. Non-PDF files and files the store failed to
/// write are rejected individually; the request only fails when nothing was
/// accepted.
pub async fn upload_pdfs(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RouteResult<Json<UploadResponse>> {
    let max_files = state.config.upload.max_files;
    let mut files = Vec::new();
    let mut rejected = Vec::new();
    let mut seen = 0;
    let mut storage_error = None;

    while let Some(field) = multipart.next_field().await.or_bad_request()? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        seen += 1;

        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        if seen > max_files {
            rejected.push(RejectedFile {
                filename,
                message: format!("Too many files (at most {max_files} per upload)"),
            });
            continue;
        }

        let media_type = declared_media_type(field.content_type(), &filename);
        let data = field.bytes().await.or_bad_request()?;

        match state.processor.ingest(data, &filename, &media_type).await {
            Ok(doc) => files.push(FileInfo::from(&doc)),
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                warn!("Rejected upload {}: {}", filename, e);
                rejected.push(RejectedFile {
                    filename,
                    message: "Only PDF files are allowed".to_string(),
                });
            }
            Err(e) => {
                // Files stored earlier in the batch are still reported
                error!("Failed to store upload {}: {}", filename, e);
                rejected.push(RejectedFile {
                    filename,
                    message: e.to_string(),
                });
                storage_error.get_or_insert(e);
            }
        }
    }

    if files.is_empty() {
        if let Some(e) = storage_error {
            return Err(e.into());
        }
        let message = if rejected.is_empty() {
            "No files uploaded"
        } else {
            "Only PDF files are allowed"
        };
        return Err(ApiError::bad_request(message));
    }

    info!(
        "Accepted {} uploads ({} rejected)",
        files.len(),
        rejected.len()
    );

    Ok(Json(UploadResponse {
        success: true,
        files,
        rejected,
    }))
}

/// The part's declared content type, or a guess from the file name when the
/// client sent none (or only the generic binary type).
fn declared_media_type(content_type: Option<&str>, filename: &str) -> String {
    match content_type {
        Some(ct) if !ct.eq_ignore_ascii_case("application/octet-stream") => ct.to_string(),
        _ => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}
