//! Handlers for the `/browse` resource: one directory with its columns,
//! subdirectories and parts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use partvault_core::error::CoreError;
use partvault_core::metadata::Column;
use partvault_core::thumbnails::Thumbnail;
use partvault_core::tree::DirectoryNode;
use partvault_core::viewer::Viewer;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::blocking;
use crate::middleware::viewer::RequestViewer;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    /// Key of a batch whose marked parts are flagged in the response.
    pub batch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryView {
    pub ds: String,
    pub path: String,
    pub name: String,
    pub label: String,
    pub parent_url: Option<String>,
    pub icon_url: Option<String>,
    pub text_icon_url: Option<String>,
    pub tech_spec_url: Option<String>,
    pub parts_index_url: Option<String>,
    pub columns: Vec<Column>,
    pub directories: Vec<DirectoryEntry>,
    pub parts: Vec<PartView>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub label: String,
    pub path: String,
    pub url: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PartView {
    pub name: String,
    pub base_name: String,
    pub part_type: String,
    pub version: u64,
    pub size: u64,
    pub accessible: bool,
    /// Annotation values keyed by column handle.
    pub values: HashMap<String, String>,
    pub thumbnail: Option<Thumbnail>,
    pub marked: bool,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Build (or fetch) the node at `path` and populate its listing off the
/// async runtime.
pub(crate) async fn load_directory(
    state: &AppState,
    viewer: Arc<Viewer>,
    ds: String,
    path: String,
) -> AppResult<Arc<DirectoryNode>> {
    let tree = Arc::clone(&state.tree);
    let node = blocking(move || -> Result<_, CoreError> {
        let node = tree.get_or_build(&ds, &path, &viewer)?;
        tree.listing(&node);
        Ok(node)
    })
    .await??;
    Ok(node)
}

fn browse_url(state: &AppState, ds: &str, path: &str) -> String {
    let prefix = state.settings.browse_prefix.trim_end_matches('/');
    if path.is_empty() {
        format!("{prefix}/{ds}")
    } else {
        format!("{prefix}/{ds}/{path}")
    }
}

fn resource_url(state: &AppState, node: &DirectoryNode, file: Option<&String>) -> Option<String> {
    file.map(|f| {
        state.settings.static_url(
            &node.location.data_source,
            &node.metadata_file_path(&state.settings, f),
        )
    })
}

fn directory_view(state: &AppState, node: &DirectoryNode, marked: &HashSet<String>) -> DirectoryView {
    let ds = &node.location.data_source;
    let listing = state.tree.listing(node);

    let directories = listing
        .directories
        .iter()
        .map(|child| DirectoryEntry {
            name: child.name.clone(),
            label: child.display_label().to_string(),
            path: child.full_path().to_string(),
            url: browse_url(state, child.ds_name(), child.full_path()),
            icon_url: resource_url(state, child, child.resources.icon.as_ref()),
        })
        .collect();

    let parts = listing
        .parts
        .iter()
        .map(|part| PartView {
            name: part.file_name.clone(),
            base_name: part.base_name.clone(),
            part_type: part.part_type.clone(),
            version: part.version,
            size: part.size,
            accessible: part.accessible,
            values: node.annotations_for(part).cloned().unwrap_or_default(),
            thumbnail: part
                .thumbnail
                .as_deref()
                .and_then(|image| state.thumbnails.render(ds, image)),
            marked: marked.contains(&part.file_name),
        })
        .collect();

    DirectoryView {
        ds: node.ds_name().to_string(),
        path: node.full_path().to_string(),
        name: node.name.clone(),
        label: node.display_label().to_string(),
        parent_url: (!node.is_root()).then(|| browse_url(state, node.ds_name(), &node.relative_path)),
        icon_url: resource_url(state, node, node.resources.icon.as_ref()),
        text_icon_url: resource_url(state, node, node.resources.text_icon.as_ref()),
        tech_spec_url: resource_url(state, node, node.resources.tech_spec.as_ref()),
        parts_index_url: resource_url(state, node, node.resources.parts_index.as_ref()),
        columns: node.columns.clone(),
        directories,
        parts,
    }
}

async fn render(
    state: AppState,
    viewer: Arc<Viewer>,
    ds: String,
    path: String,
    query: BrowseQuery,
) -> AppResult<Json<DataResponse<DirectoryView>>> {
    let batch = match &query.batch {
        Some(key) => Some(state.batches.find_by_key(key).await?),
        None => None,
    };

    let node = load_directory(&state, viewer, ds, path).await?;
    if !node.accessible {
        return Err(CoreError::PathDenied.into());
    }

    let marked = match &batch {
        Some(batch) => state.batches.marked_in(batch, &node).await?,
        None => HashSet::new(),
    };

    Ok(Json(DataResponse {
        data: directory_view(&state, &node, &marked),
    }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/browse/{ds}
pub async fn show_root(
    State(state): State<AppState>,
    RequestViewer(viewer): RequestViewer,
    Path(ds): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> AppResult<Json<DataResponse<DirectoryView>>> {
    render(state, viewer, ds, String::new(), query).await
}

/// GET /api/v1/browse/{ds}/{*path}
pub async fn show_directory(
    State(state): State<AppState>,
    RequestViewer(viewer): RequestViewer,
    Path((ds, path)): Path<(String, String)>,
    Query(query): Query<BrowseQuery>,
) -> AppResult<Json<DataResponse<DirectoryView>>> {
    render(state, viewer, ds, path, query).await
}
