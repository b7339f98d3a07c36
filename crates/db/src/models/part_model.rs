//! Part rows shared by all batches.

use partvault_core::batch::PartRecord;
use partvault_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `part_models` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PartModel {
    pub id: DbId,
    pub ds_name: String,
    pub dir_path: String,
    pub name: String,
    pub hash: String,
    pub created_at: Timestamp,
}

/// DTO for inserting a part.
#[derive(Debug, Clone)]
pub struct CreatePartModel<'a> {
    pub ds_name: &'a str,
    pub dir_path: &'a str,
    pub name: &'a str,
    pub hash: &'a str,
}

impl From<PartModel> for PartRecord {
    fn from(row: PartModel) -> Self {
        PartRecord {
            id: row.id,
            ds_name: row.ds_name,
            dir_path: row.dir_path,
            name: row.name,
            hash: row.hash,
        }
    }
}
