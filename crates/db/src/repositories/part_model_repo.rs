//! Repository for the `part_models` table.

use partvault_core::types::DbId;
use sqlx::PgPool;

use crate::models::part_model::{CreatePartModel, PartModel};

const COLUMNS: &str = "id, ds_name, dir_path, name, hash, created_at";

/// Same columns qualified with the `pm` alias, for joins.
const JOINED_COLUMNS: &str = "\
    pm.id, pm.ds_name, pm.dir_path, pm.name, pm.hash, pm.created_at";

pub struct PartModelRepo;

impl PartModelRepo {
    pub async fn find_by_hash(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hash: &str,
    ) -> Result<Option<PartModel>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM part_models WHERE hash = $1");
        sqlx::query_as::<_, PartModel>(&query)
            .bind(hash)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Return the part with `input.hash`, inserting it first if needed.
    ///
    /// A row inserted concurrently by another transaction wins; its values
    /// are returned instead.
    pub async fn get_or_create(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreatePartModel<'_>,
    ) -> Result<PartModel, sqlx::Error> {
        let query = format!(
            "INSERT INTO part_models (ds_name, dir_path, name, hash) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (hash) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, PartModel>(&query)
            .bind(input.ds_name)
            .bind(input.dir_path)
            .bind(input.name)
            .bind(input.hash)
            .fetch_optional(&mut **tx)
            .await?;

        match inserted {
            Some(part) => Ok(part),
            None => Self::find_by_hash(tx, input.hash)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Parts joined to a batch, ordered by file name.
    pub async fn list_for_batch(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<PartModel>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM part_models pm \
             JOIN part_downloads pd ON pd.part_model_id = pm.id \
             WHERE pd.download_batch_id = $1 \
             ORDER BY pm.name, pm.id"
        );
        sqlx::query_as::<_, PartModel>(&query)
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Parts joined to a batch that live in one directory.
    pub async fn list_for_batch_in_dir(
        pool: &PgPool,
        batch_id: DbId,
        ds_name: &str,
        dir_path: &str,
    ) -> Result<Vec<PartModel>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM part_models pm \
             JOIN part_downloads pd ON pd.part_model_id = pm.id \
             WHERE pd.download_batch_id = $1 AND pm.ds_name = $2 AND pm.dir_path = $3 \
             ORDER BY pm.name, pm.id"
        );
        sqlx::query_as::<_, PartModel>(&query)
            .bind(batch_id)
            .bind(ds_name)
            .bind(dir_path)
            .fetch_all(pool)
            .await
    }
}
