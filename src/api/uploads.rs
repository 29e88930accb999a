//! Image upload endpoints.
//!
//! Uploads arrive as raw bytes; the response carries the opaque locator that
//! a post write then stores as its image reference.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::AuthenticatedUser;
use crate::errors::AppError;
use crate::AppState;

/// Query parameters for an upload.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// Response body for a stored upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
}

/// POST /api/uploads?filename=... - Store an uploaded image.
pub async fn upload_image(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<UploadResponse> {
    let locator = state.blobs.save(&body, &query.filename).await?;
    success(UploadResponse { image_url: locator })
}

/// GET /api/uploads/:locator - Serve a stored image.
pub async fn serve_image(
    State(state): State<AppState>,
    Path(locator): Path<String>,
) -> Result<Response, AppError> {
    match state.blobs.read(&locator).await? {
        Some(bytes) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&locator))],
            bytes,
        )
            .into_response()),
        None => Err(AppError::NotFound(format!("No upload named {}", locator))),
    }
}

/// Guess the content type from the locator's extension.
fn content_type_for(locator: &str) -> &'static str {
    let ext = locator
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
