//! Merge route.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use super::{FileResponse, MergeRequest};
use crate::helpers::{ApiError, RouteResult};
use crate::state::AppState;

/// Merge stored documents into a new one.
pub async fn merge_pdfs(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> RouteResult<Json<FileResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let doc = state
        .processor
        .merge(&request.files, request.order.as_deref())
        .await?;

    Ok(Json(FileResponse::from(&doc)))
}
