//! Handlers for the `/batches` resource.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use partvault_core::batch::{
    archive, BatchSnapshot, BatchState, DownloadBatch, PartSelection, ToggleSummary,
};
use partvault_core::error::CoreError;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::handlers::browse::load_directory;
use crate::middleware::auth::OptionalUser;
use crate::middleware::viewer::RequestViewer;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /batches/{key}/parts`.
#[derive(Debug, Deserialize, Validate)]
pub struct ToggleRequest {
    #[validate(length(min = 1, max = 64))]
    pub ds: String,
    /// Directory path relative to the data source root.
    #[serde(default)]
    pub path: String,
    #[validate(length(min = 1, message = "At least one part must be selected"))]
    pub parts: Vec<PartSelection>,
}

#[derive(Debug, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub snapshot: BatchSnapshot,
    /// Set once the archive is built.
    pub download_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn batch_view(state: &AppState, batch: &DownloadBatch) -> AppResult<BatchView> {
    let snapshot = state.batches.snapshot(batch).await?;
    let download_url = (batch.state == BatchState::Done)
        .then(|| format!("/api/v1/batches/{}/download", batch.key));
    Ok(BatchView {
        snapshot,
        download_url,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/batches
///
/// Create an empty batch owned by the caller (anonymous if not logged in).
pub async fn create(
    State(state): State<AppState>,
    user: OptionalUser,
) -> AppResult<impl IntoResponse> {
    let batch = state.batches.create_batch(user.username()).await?;
    let view = batch_view(&state, &batch).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// GET /api/v1/batches/{key}
pub async fn show(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<DataResponse<BatchView>>> {
    let batch = state.batches.find_by_key(&key).await?;
    Ok(Json(DataResponse {
        data: batch_view(&state, &batch).await?,
    }))
}

/// POST /api/v1/batches/{key}/parts
///
/// Mark or unmark parts of one directory.
pub async fn toggle_parts(
    State(state): State<AppState>,
    RequestViewer(viewer): RequestViewer,
    Path(key): Path<String>,
    Json(input): Json<ToggleRequest>,
) -> AppResult<Json<DataResponse<ToggleSummary>>> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let batch = state.batches.find_by_key(&key).await?;
    let node = load_directory(&state, viewer, input.ds, input.path).await?;
    let summary = state
        .batches
        .toggle_parts(&state.tree, &batch, &node, &input.parts)
        .await?;

    Ok(Json(DataResponse { data: summary }))
}

/// POST /api/v1/batches/{key}/build
///
/// Freeze the batch and build its archive in the background.
pub async fn build(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let batch = state.batches.find_by_key(&key).await?;
    let preparing = state.batches.start_build(&batch).await?;
    let view = batch_view(&state, &preparing).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: view })))
}

/// GET /api/v1/batches/{key}/download
///
/// Stream the built archive.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let batch = state.batches.find_by_key(&key).await?;
    if batch.state != BatchState::Done {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Batch is {} and has no archive to download",
            batch.state.as_str()
        ))));
    }

    let path = state
        .batches
        .archive_path(&batch)
        .ok_or_else(|| AppError::InternalError(format!("Batch {} has no archive path", batch.id)))?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        AppError::InternalError(format!("Failed to open {}: {e}", path.display()))
    })?;
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    let disposition = format!(
        "attachment; filename=\"{}.zip\"",
        archive::archive_name(batch.id)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}
