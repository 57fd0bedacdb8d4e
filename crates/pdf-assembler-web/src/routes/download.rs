//! Download route - streams a stored PDF.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use pdf_assembler_core::PDF_MEDIA_TYPE;
use std::sync::Arc;

use crate::helpers::{ResultExt, RouteResult};
use crate::state::AppState;

/// Stored documents never change, so clients may cache them for good.
const IMMUTABLE_CACHE: &str = "private, max-age=31536000, immutable";

/// Download a stored document under its original or derived name.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let doc = state.processor.fetch(&file_id).await?;
    let etag = format!("\"{}\"", doc.checksum);

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == etag);

    if not_modified {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, etag)
            .header(header::CACHE_CONTROL, IMMUTABLE_CACHE)
            .body(Body::empty())
            .or_internal_error();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_MEDIA_TYPE)
        .header(header::CONTENT_LENGTH, doc.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&doc.original_name),
        )
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, IMMUTABLE_CACHE)
        .body(Body::from(doc.bytes))
        .or_internal_error()
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// in RFC 5987 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
