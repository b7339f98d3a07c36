use partvault_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `part_downloads` join table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PartDownload {
    pub id: DbId,
    pub download_batch_id: DbId,
    pub part_model_id: DbId,
    pub created_at: Timestamp,
}
