use axum::routing::get;
use axum::Router;

use crate::handlers::tree;
use crate::state::AppState;

/// Routes mounted at `/tree`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{ds}", get(tree::root_tree))
        .route("/{ds}/{*path}", get(tree::directory_tree))
}
