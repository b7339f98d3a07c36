//! Repository for the `part_downloads` join table.

use partvault_core::types::DbId;

pub struct PartDownloadRepo;

impl PartDownloadRepo {
    /// Link a part to a batch. Returns `false` if the link already existed.
    pub async fn link(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch_id: DbId,
        part_model_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO part_downloads (download_batch_id, part_model_id) \
             VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_part_downloads_batch_part DO NOTHING",
        )
        .bind(batch_id)
        .bind(part_model_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a link. Returns `false` if there was none.
    pub async fn unlink(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch_id: DbId,
        part_model_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM part_downloads WHERE download_batch_id = $1 AND part_model_id = $2",
        )
        .bind(batch_id)
        .bind(part_model_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
