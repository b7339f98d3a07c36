//! Route definitions for the `/batches` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// POST /                 -> create
/// GET  /{key}            -> show
/// POST /{key}/parts      -> toggle_parts
/// POST /{key}/build      -> build
/// GET  /{key}/download   -> download
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(batches::create))
        .route("/{key}", get(batches::show))
        .route("/{key}/parts", post(batches::toggle_parts))
        .route("/{key}/build", post(batches::build))
        .route("/{key}/download", get(batches::download))
}
