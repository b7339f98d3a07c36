//! Integration tests for the PostgreSQL batch store.
//!
//! Need a live database (`DATABASE_URL`); run with `cargo test -- --ignored`.

use partvault_core::batch::{BatchState, BatchStore, PartToggle, ToggleOutcome};
use partvault_core::error::StoreError;
use partvault_db::PgBatchStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn toggle(name: &str, mark: bool) -> PartToggle {
    PartToggle {
        ds_name: "ds1".to_string(),
        dir_path: "widgets".to_string(),
        name: name.to_string(),
        hash: format!("hash-{name}"),
        mark,
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_batch_lifecycle(pool: PgPool) {
    let store = PgBatchStore::new(pool);

    let batch = store.create_batch("k1", Some("alice")).await.unwrap();
    assert_eq!(batch.state, BatchState::Open);
    assert_eq!(batch.owner.as_deref(), Some("alice"));

    let found = store.find_batch_by_key("k1").await.unwrap().unwrap();
    assert_eq!(found.id, batch.id);

    let preparing = store
        .transition_batch(batch.id, &[BatchState::Open], BatchState::Preparing, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(preparing.state, BatchState::Preparing);

    let done = store
        .transition_batch(
            batch.id,
            &[BatchState::Preparing],
            BatchState::Done,
            Some("k1/parts-1.zip"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.state, BatchState::Done);
    assert_eq!(done.zip_file.as_deref(), Some("k1/parts-1.zip"));
    assert!(done.updated_at >= batch.updated_at);

    assert!(store.find_batch(batch.id + 1000).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_duplicate_key_is_reported(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    store.create_batch("same", None).await.unwrap();

    let err = store.create_batch("same", None).await.unwrap_err();
    assert!(
        matches!(err, StoreError::Duplicate(ref c) if c == "uq_download_batches_key"),
        "unexpected error: {err:?}"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_transition_missing_batch(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let moved = store
        .transition_batch(4242, &[BatchState::Preparing], BatchState::Error, None)
        .await
        .unwrap();
    assert!(moved.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_transition_only_from_expected_state(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let batch = store.create_batch("k", None).await.unwrap();
    let from = [BatchState::Open, BatchState::Error];

    let first = store
        .transition_batch(batch.id, &from, BatchState::Preparing, None)
        .await
        .unwrap();
    let second = store
        .transition_batch(batch.id, &from, BatchState::Preparing, None)
        .await
        .unwrap();
    assert_eq!(first.unwrap().state, BatchState::Preparing);
    assert!(second.is_none());
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_toggle_is_idempotent_and_shares_parts(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let a = store.create_batch("a", None).await.unwrap();
    let b = store.create_batch("b", None).await.unwrap();

    let outcomes = store
        .toggle_parts(a.id, &[toggle("gear.prt", true), toggle("gear.prt", true)])
        .await
        .unwrap();
    assert_eq!(outcomes, [ToggleOutcome::Marked, ToggleOutcome::Unchanged]);

    store
        .toggle_parts(b.id, &[toggle("gear.prt", true), toggle("axle.prt", true)])
        .await
        .unwrap();

    let parts_a = store.batch_parts(a.id).await.unwrap();
    let parts_b = store.batch_parts(b.id).await.unwrap();
    assert_eq!(parts_a.len(), 1);
    let names: Vec<_> = parts_b.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["axle.prt", "gear.prt"]);
    assert_eq!(parts_a[0].id, parts_b[1].id);

    let outcomes = store
        .toggle_parts(a.id, &[toggle("gear.prt", false), toggle("axle.prt", false)])
        .await
        .unwrap();
    assert_eq!(outcomes, [ToggleOutcome::Unmarked, ToggleOutcome::Unchanged]);
    assert!(store.batch_parts(a.id).await.unwrap().is_empty());
    assert_eq!(store.batch_parts(b.id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_marked_parts_filters_by_directory(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let batch = store.create_batch("k", None).await.unwrap();

    let mut other = toggle("bolt.prt", true);
    other.dir_path = "fasteners".to_string();
    other.hash = "hash-fasteners-bolt".to_string();

    store
        .toggle_parts(batch.id, &[toggle("gear.prt", true), other])
        .await
        .unwrap();

    let marked = store.marked_parts(batch.id, "ds1", "widgets").await.unwrap();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].name, "gear.prt");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_toggle_unknown_batch(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let err = store
        .toggle_parts(999, &[toggle("gear.prt", true)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_toggle_refused_after_batch_left_open(pool: PgPool) {
    let store = PgBatchStore::new(pool);
    let batch = store.create_batch("k", None).await.unwrap();
    store
        .transition_batch(batch.id, &[BatchState::Open], BatchState::Preparing, None)
        .await
        .unwrap();

    let err = store
        .toggle_parts(batch.id, &[toggle("gear.prt", true)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "unexpected error: {err:?}");
    assert!(store.batch_parts(batch.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_old_batches_by_state(pool: PgPool) {
    let store = PgBatchStore::new(pool.clone());
    let old = store.create_batch("old", None).await.unwrap();
    let fresh = store.create_batch("fresh", None).await.unwrap();
    for id in [old.id, fresh.id] {
        store
            .transition_batch(id, &[BatchState::Open], BatchState::Done, None)
            .await
            .unwrap();
    }

    sqlx::query("UPDATE download_batches SET updated_at = now() - interval '2 days' WHERE id = $1")
        .bind(old.id)
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::days(1);
    let expired = store
        .batches_in_state_older_than(BatchState::Done, cutoff)
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, old.id);
}
