pub mod auth;
pub mod batches;
pub mod browse;
pub mod tree;

use crate::error::{AppError, AppResult};

/// Run filesystem-bound work (tree building, users files) on the blocking
/// pool.
pub(crate) async fn blocking<F, T>(work: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Blocking task failed: {e}")))
}
