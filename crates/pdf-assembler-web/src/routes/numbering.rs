//! Page numbering route.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use super::{FileResponse, NumberRequest};
use crate::helpers::{ApiError, OptionExt, RouteResult};
use crate::state::AppState;

/// Stamp page numbers onto a stored document, producing a new one.
pub async fn add_page_numbers(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NumberRequest>, JsonRejection>,
) -> RouteResult<Json<FileResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let file_id = request
        .file_id
        .filter(|id| !id.is_empty())
        .or_bad_request("No file provided")?;

    let doc = state.processor.number_pages(&file_id).await?;

    Ok(Json(FileResponse::from(&doc)))
}
