//! Handlers for the `/tree` resource (navigation pane JSON).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use partvault_core::error::CoreError;
use partvault_core::tree_json::{format_dir, TreeNode};
use partvault_core::viewer::Viewer;

use crate::error::AppResult;
use crate::handlers::blocking;
use crate::middleware::viewer::RequestViewer;
use crate::response::DataResponse;
use crate::state::AppState;

async fn render(
    state: AppState,
    viewer: Arc<Viewer>,
    ds: String,
    path: String,
) -> AppResult<Json<DataResponse<TreeNode>>> {
    let tree = Arc::clone(&state.tree);
    let node = blocking(move || -> Result<_, CoreError> {
        let target = tree.get_or_build(&ds, &path, &viewer)?;
        let root = tree.get_or_build(&ds, "", &viewer)?;
        Ok(format_dir(&tree, &root, target.full_path()))
    })
    .await??;

    Ok(Json(DataResponse { data: node }))
}

/// GET /api/v1/tree/{ds}
pub async fn root_tree(
    State(state): State<AppState>,
    RequestViewer(viewer): RequestViewer,
    Path(ds): Path<String>,
) -> AppResult<Json<DataResponse<TreeNode>>> {
    render(state, viewer, ds, String::new()).await
}

/// GET /api/v1/tree/{ds}/{*path}
pub async fn directory_tree(
    State(state): State<AppState>,
    RequestViewer(viewer): RequestViewer,
    Path((ds, path)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<TreeNode>>> {
    render(state, viewer, ds, path).await
}
