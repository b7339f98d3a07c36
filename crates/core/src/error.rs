use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown data source or a path that leaves its root. Carries no detail
    /// so callers cannot tell the two apart.
    #[error("Access denied")]
    PathDenied,

    #[error("Could not generate a unique batch key after {attempts} attempts")]
    KeyGenerationExhausted { attempts: usize },

    #[error("Archive build failed: {0}")]
    ZipBuild(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by a [`crate::batch::BatchStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    #[error("Record not found")]
    NotFound,

    /// The record is not in a state that allows the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}
