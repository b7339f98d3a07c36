pub mod auth;
pub mod batches;
pub mod browse;
pub mod health;
pub mod tree;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                         login (public)
/// /auth/me                            current user (requires auth)
///
/// /browse/{ds}                        data source root
/// /browse/{ds}/{*path}                directory view, ?batch=<key> marks parts
///
/// /tree/{ds}                          tree JSON of the root
/// /tree/{ds}/{*path}                  tree JSON opened to path
///
/// /batches                            create (POST)
/// /batches/{key}                      snapshot
/// /batches/{key}/parts                toggle parts of one directory (POST)
/// /batches/{key}/build                start archive build (POST)
/// /batches/{key}/download             stream the built ZIP
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/browse", browse::router())
        .nest("/tree", tree::router())
        .nest("/batches", batches::router())
}
