//! Repository for the `download_batches` table.

use partvault_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::download_batch::DownloadBatchRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, key, owner, state, zip_file, created_at, updated_at";

/// Provides CRUD operations for download batches.
pub struct DownloadBatchRepo;

impl DownloadBatchRepo {
    /// Insert a new batch in state `open`.
    pub async fn create(
        pool: &PgPool,
        key: &str,
        owner: Option<&str>,
    ) -> Result<DownloadBatchRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO download_batches (key, owner) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DownloadBatchRow>(&query)
            .bind(key)
            .bind(owner)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DownloadBatchRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM download_batches WHERE id = $1");
        sqlx::query_as::<_, DownloadBatchRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<DownloadBatchRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM download_batches WHERE key = $1");
        sqlx::query_as::<_, DownloadBatchRow>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Lock a batch row for the rest of the transaction and return its
    /// state. `None` if the batch does not exist.
    pub async fn lock(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<Option<i16>, sqlx::Error> {
        sqlx::query_scalar("SELECT state FROM download_batches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Set state and archive path if the current state is one of `from`.
    /// Returns `None` if the batch does not exist or is in another state.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: &[i16],
        to: i16,
        zip_file: Option<&str>,
    ) -> Result<Option<DownloadBatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE download_batches \
             SET state = $3, zip_file = $4, updated_at = now() \
             WHERE id = $1 AND state = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DownloadBatchRow>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(zip_file)
            .fetch_optional(pool)
            .await
    }

    /// Batches in `state` last updated before `cutoff`, oldest first.
    pub async fn list_in_state_before(
        pool: &PgPool,
        state: i16,
        cutoff: Timestamp,
    ) -> Result<Vec<DownloadBatchRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM download_batches \
             WHERE state = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC"
        );
        sqlx::query_as::<_, DownloadBatchRow>(&query)
            .bind(state)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
