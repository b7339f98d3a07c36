//! Download batch rows.

use partvault_core::batch::{BatchState, DownloadBatch};
use partvault_core::error::StoreError;
use partvault_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `download_batches` table. `state` is the raw SMALLINT.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DownloadBatchRow {
    pub id: DbId,
    pub key: String,
    pub owner: Option<String>,
    pub state: i16,
    pub zip_file: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<DownloadBatchRow> for DownloadBatch {
    type Error = StoreError;

    fn try_from(row: DownloadBatchRow) -> Result<Self, StoreError> {
        Ok(DownloadBatch {
            id: row.id,
            key: row.key,
            owner: row.owner,
            state: BatchState::try_from(row.state)?,
            zip_file: row.zip_file,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
