//! [`BatchStore`] backed by PostgreSQL.

use async_trait::async_trait;
use partvault_core::batch::{
    BatchState, BatchStore, DownloadBatch, PartRecord, PartToggle, ToggleOutcome,
};
use partvault_core::error::StoreError;
use partvault_core::types::{DbId, Timestamp};

use crate::models::part_model::CreatePartModel;
use crate::repositories::{DownloadBatchRepo, PartDownloadRepo, PartModelRepo};
use crate::DbPool;

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgBatchStore {
    pool: DbPool,
}

impl PgBatchStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto the store's error kinds.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Duplicate(db_err.constraint().unwrap_or("unknown").to_string())
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Backend(err.to_string())
        }
    }
}

fn rows_to_parts(rows: Vec<crate::models::part_model::PartModel>) -> Vec<PartRecord> {
    rows.into_iter().map(PartRecord::from).collect()
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn create_batch(
        &self,
        key: &str,
        owner: Option<&str>,
    ) -> Result<DownloadBatch, StoreError> {
        DownloadBatchRepo::create(&self.pool, key, owner)
            .await
            .map_err(store_error)?
            .try_into()
    }

    async fn find_batch(&self, id: DbId) -> Result<Option<DownloadBatch>, StoreError> {
        DownloadBatchRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)?
            .map(DownloadBatch::try_from)
            .transpose()
    }

    async fn find_batch_by_key(&self, key: &str) -> Result<Option<DownloadBatch>, StoreError> {
        DownloadBatchRepo::find_by_key(&self.pool, key)
            .await
            .map_err(store_error)?
            .map(DownloadBatch::try_from)
            .transpose()
    }

    async fn transition_batch(
        &self,
        id: DbId,
        from: &[BatchState],
        to: BatchState,
        zip_file: Option<&str>,
    ) -> Result<Option<DownloadBatch>, StoreError> {
        let from: Vec<i16> = from.iter().copied().map(i16::from).collect();
        DownloadBatchRepo::transition(&self.pool, id, &from, to.into(), zip_file)
            .await
            .map_err(store_error)?
            .map(DownloadBatch::try_from)
            .transpose()
    }

    async fn marked_parts(
        &self,
        batch_id: DbId,
        ds_name: &str,
        dir_path: &str,
    ) -> Result<Vec<PartRecord>, StoreError> {
        PartModelRepo::list_for_batch_in_dir(&self.pool, batch_id, ds_name, dir_path)
            .await
            .map(rows_to_parts)
            .map_err(store_error)
    }

    async fn toggle_parts(
        &self,
        batch_id: DbId,
        toggles: &[PartToggle],
    ) -> Result<Vec<ToggleOutcome>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let state = DownloadBatchRepo::lock(&mut tx, batch_id)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)?;
        let state = BatchState::try_from(state)?;
        if state != BatchState::Open {
            return Err(StoreError::Conflict(format!(
                "Batch is {} and no longer accepts changes",
                state.as_str()
            )));
        }

        let mut outcomes = Vec::with_capacity(toggles.len());
        for toggle in toggles {
            let outcome = if toggle.mark {
                let part = PartModelRepo::get_or_create(
                    &mut tx,
                    &CreatePartModel {
                        ds_name: &toggle.ds_name,
                        dir_path: &toggle.dir_path,
                        name: &toggle.name,
                        hash: &toggle.hash,
                    },
                )
                .await
                .map_err(store_error)?;

                if PartDownloadRepo::link(&mut tx, batch_id, part.id)
                    .await
                    .map_err(store_error)?
                {
                    ToggleOutcome::Marked
                } else {
                    ToggleOutcome::Unchanged
                }
            } else {
                let part = PartModelRepo::find_by_hash(&mut tx, &toggle.hash)
                    .await
                    .map_err(store_error)?;
                let removed = match part {
                    Some(part) => PartDownloadRepo::unlink(&mut tx, batch_id, part.id)
                        .await
                        .map_err(store_error)?,
                    None => false,
                };
                if removed {
                    ToggleOutcome::Unmarked
                } else {
                    ToggleOutcome::Unchanged
                }
            };
            outcomes.push(outcome);
        }

        tx.commit().await.map_err(store_error)?;
        Ok(outcomes)
    }

    async fn batch_parts(&self, batch_id: DbId) -> Result<Vec<PartRecord>, StoreError> {
        PartModelRepo::list_for_batch(&self.pool, batch_id)
            .await
            .map(rows_to_parts)
            .map_err(store_error)
    }

    async fn batches_in_state_older_than(
        &self,
        state: BatchState,
        cutoff: Timestamp,
    ) -> Result<Vec<DownloadBatch>, StoreError> {
        DownloadBatchRepo::list_in_state_before(&self.pool, state.into(), cutoff)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(DownloadBatch::try_from)
            .collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(store_error)
    }
}
