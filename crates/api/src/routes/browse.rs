use axum::routing::get;
use axum::Router;

use crate::handlers::browse;
use crate::state::AppState;

/// Routes mounted at `/browse`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{ds}", get(browse::show_root))
        .route("/{ds}/{*path}", get(browse::show_directory))
}
