//! In-process [`BatchStore`] for tests and single-node development.
//!
//! One mutex guards all tables, so every call is atomic.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::batch::{BatchState, BatchStore, DownloadBatch, PartRecord, PartToggle, ToggleOutcome};
use crate::error::StoreError;
use crate::types::{DbId, Timestamp};

#[derive(Default)]
struct Tables {
    batches: BTreeMap<DbId, DownloadBatch>,
    parts: BTreeMap<DbId, PartRecord>,
    /// `(batch_id, part_id)` join records.
    links: BTreeSet<(DbId, DbId)>,
    next_batch_id: DbId,
    next_part_id: DbId,
}

impl Tables {
    fn part_id_by_hash(&self, hash: &str) -> Option<DbId> {
        self.parts
            .values()
            .find(|p| p.hash == hash)
            .map(|p| p.id)
    }

    fn parts_of(&self, batch_id: DbId) -> Vec<PartRecord> {
        let mut parts: Vec<PartRecord> = self
            .links
            .range((batch_id, DbId::MIN)..=(batch_id, DbId::MAX))
            .filter_map(|(_, part_id)| self.parts.get(part_id).cloned())
            .collect();
        parts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        parts
    }
}

#[derive(Default)]
pub struct MemoryBatchStore {
    tables: Mutex<Tables>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a batch's `updated_at` into the past.
    pub async fn backdate(&self, batch_id: DbId, updated_at: Timestamp) {
        if let Some(batch) = self.tables.lock().await.batches.get_mut(&batch_id) {
            batch.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn create_batch(
        &self,
        key: &str,
        owner: Option<&str>,
    ) -> Result<DownloadBatch, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.batches.values().any(|b| b.key == key) {
            return Err(StoreError::Duplicate(format!("batch key '{key}'")));
        }

        tables.next_batch_id += 1;
        let now = Utc::now();
        let batch = DownloadBatch {
            id: tables.next_batch_id,
            key: key.to_string(),
            owner: owner.map(str::to_string),
            state: BatchState::Open,
            zip_file: None,
            created_at: now,
            updated_at: now,
        };
        tables.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn find_batch(&self, id: DbId) -> Result<Option<DownloadBatch>, StoreError> {
        Ok(self.tables.lock().await.batches.get(&id).cloned())
    }

    async fn find_batch_by_key(&self, key: &str) -> Result<Option<DownloadBatch>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .batches
            .values()
            .find(|b| b.key == key)
            .cloned())
    }

    async fn transition_batch(
        &self,
        id: DbId,
        from: &[BatchState],
        to: BatchState,
        zip_file: Option<&str>,
    ) -> Result<Option<DownloadBatch>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(batch) = tables.batches.get_mut(&id) else {
            return Ok(None);
        };
        if !from.contains(&batch.state) {
            return Ok(None);
        }
        batch.state = to;
        batch.zip_file = zip_file.map(str::to_string);
        batch.updated_at = Utc::now();
        Ok(Some(batch.clone()))
    }

    async fn marked_parts(
        &self,
        batch_id: DbId,
        ds_name: &str,
        dir_path: &str,
    ) -> Result<Vec<PartRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .parts_of(batch_id)
            .into_iter()
            .filter(|p| p.ds_name == ds_name && p.dir_path == dir_path)
            .collect())
    }

    async fn toggle_parts(
        &self,
        batch_id: DbId,
        toggles: &[PartToggle],
    ) -> Result<Vec<ToggleOutcome>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.batches.get(&batch_id) {
            None => return Err(StoreError::NotFound),
            Some(batch) if batch.state != BatchState::Open => {
                return Err(StoreError::Conflict(format!(
                    "Batch is {} and no longer accepts changes",
                    batch.state.as_str()
                )));
            }
            Some(_) => {}
        }

        let mut outcomes = Vec::with_capacity(toggles.len());
        for toggle in toggles {
            let existing = tables.part_id_by_hash(&toggle.hash);

            let outcome = if toggle.mark {
                let part_id = match existing {
                    Some(id) => id,
                    None => {
                        tables.next_part_id += 1;
                        let id = tables.next_part_id;
                        tables.parts.insert(
                            id,
                            PartRecord {
                                id,
                                ds_name: toggle.ds_name.clone(),
                                dir_path: toggle.dir_path.clone(),
                                name: toggle.name.clone(),
                                hash: toggle.hash.clone(),
                            },
                        );
                        id
                    }
                };
                if tables.links.insert((batch_id, part_id)) {
                    ToggleOutcome::Marked
                } else {
                    ToggleOutcome::Unchanged
                }
            } else {
                match existing {
                    Some(part_id) if tables.links.remove(&(batch_id, part_id)) => {
                        ToggleOutcome::Unmarked
                    }
                    _ => ToggleOutcome::Unchanged,
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn batch_parts(&self, batch_id: DbId) -> Result<Vec<PartRecord>, StoreError> {
        Ok(self.tables.lock().await.parts_of(batch_id))
    }

    async fn batches_in_state_older_than(
        &self,
        state: BatchState,
        cutoff: Timestamp,
    ) -> Result<Vec<DownloadBatch>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .batches
            .values()
            .filter(|b| b.state == state && b.updated_at < cutoff)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
