//! Download batches: collecting parts and snapshotting them into a ZIP.
//!
//! State machine:
//!
//! ```text
//! OPEN -> PREPARING -> DONE -> CLOSED
//!   ^        |
//!   |        v
//!   +----- ERROR
//! ```
//!
//! Persistence goes through [`BatchStore`]; the engine never talks to a
//! database directly.

pub mod archive;
pub mod memory;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;

use crate::error::{CoreError, StoreError};
use crate::paths;
use crate::settings::Settings;
use crate::tree::{DirectoryNode, DirectoryTree};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Extra attempts after a batch key collides with an existing one.
pub const MAX_KEY_RETRIES: usize = 5;

/// Random bytes per batch key (hex encoded to 40 characters).
pub const KEY_BYTES: usize = 20;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum BatchState {
    Open = 0,
    Preparing = 1,
    Done = 2,
    Error = 3,
    Closed = 4,
}

impl BatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Preparing => "preparing",
            Self::Done => "done",
            Self::Error => "error",
            Self::Closed => "closed",
        }
    }
}

impl From<BatchState> for i16 {
    fn from(state: BatchState) -> Self {
        state as i16
    }
}

impl TryFrom<i16> for BatchState {
    type Error = StoreError;

    fn try_from(value: i16) -> Result<Self, StoreError> {
        match value {
            0 => Ok(Self::Open),
            1 => Ok(Self::Preparing),
            2 => Ok(Self::Done),
            3 => Ok(Self::Error),
            4 => Ok(Self::Closed),
            other => Err(StoreError::Backend(format!("Unknown batch state {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadBatch {
    pub id: DbId,
    pub key: String,
    pub owner: Option<String>,
    pub state: BatchState,
    /// Archive path relative to the download root, once built.
    pub zip_file: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A part as persisted for batches. `hash` is unique across all parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartRecord {
    pub id: DbId,
    pub ds_name: String,
    pub dir_path: String,
    pub name: String,
    pub hash: String,
}

/// One requested change to a batch's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartToggle {
    pub ds_name: String,
    pub dir_path: String,
    pub name: String,
    pub hash: String,
    pub mark: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Marked,
    Unmarked,
    /// Already in the requested state.
    Unchanged,
}

/// A selection sent by a client: file name within one directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartSelection {
    pub name: String,
    pub mark: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToggleSummary {
    pub marked: usize,
    pub unmarked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSnapshot {
    pub key: String,
    pub state: BatchState,
    pub part_count: usize,
    /// Sum of the part file sizes.
    pub approximate_size: u64,
    /// Size of the built archive.
    pub real_size: Option<u64>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence of batches, parts and their join records.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Insert an `OPEN` batch. A taken key yields [`StoreError::Duplicate`].
    async fn create_batch(&self, key: &str, owner: Option<&str>)
        -> Result<DownloadBatch, StoreError>;

    async fn find_batch(&self, id: DbId) -> Result<Option<DownloadBatch>, StoreError>;

    async fn find_batch_by_key(&self, key: &str) -> Result<Option<DownloadBatch>, StoreError>;

    /// Move the batch to `to` and set its archive path, touching
    /// `updated_at`, but only while its state is one of `from`. `None` when
    /// the batch is missing or in another state.
    async fn transition_batch(
        &self,
        id: DbId,
        from: &[BatchState],
        to: BatchState,
        zip_file: Option<&str>,
    ) -> Result<Option<DownloadBatch>, StoreError>;

    /// Parts of the batch that live in one directory.
    async fn marked_parts(
        &self,
        batch_id: DbId,
        ds_name: &str,
        dir_path: &str,
    ) -> Result<Vec<PartRecord>, StoreError>;

    /// Apply all toggles atomically. Marking creates the part record if
    /// needed; a join record inserted concurrently is treated as present.
    /// Fails with [`StoreError::Conflict`] unless the batch is `OPEN` at the
    /// time of the write.
    async fn toggle_parts(
        &self,
        batch_id: DbId,
        toggles: &[PartToggle],
    ) -> Result<Vec<ToggleOutcome>, StoreError>;

    /// All parts of the batch, ordered by name.
    async fn batch_parts(&self, batch_id: DbId) -> Result<Vec<PartRecord>, StoreError>;

    async fn batches_in_state_older_than(
        &self,
        state: BatchState,
        cutoff: Timestamp,
    ) -> Result<Vec<DownloadBatch>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A fresh random batch key of [`KEY_BYTES`] bytes, hex encoded.
pub fn generate_key() -> String {
    let bytes: [u8; KEY_BYTES] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub type KeyGenerator = Arc<dyn Fn() -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DownloadBatchEngine {
    store: Arc<dyn BatchStore>,
    settings: Arc<Settings>,
    key_generator: KeyGenerator,
    /// Archive builds detached by [`Self::start_build`].
    builds: TaskTracker,
}

impl DownloadBatchEngine {
    pub fn new(store: Arc<dyn BatchStore>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            settings,
            key_generator: Arc::new(generate_key),
            builds: TaskTracker::new(),
        }
    }

    pub fn with_key_generator(mut self, key_generator: KeyGenerator) -> Self {
        self.key_generator = key_generator;
        self
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    /// Create an `OPEN` batch, retrying on key collisions.
    pub async fn create_batch(&self, owner: Option<&str>) -> Result<DownloadBatch, CoreError> {
        let attempts = MAX_KEY_RETRIES + 1;

        for attempt in 1..=attempts {
            let key = (self.key_generator)();
            match self.store.create_batch(&key, owner).await {
                Ok(batch) => {
                    tracing::info!(batch_id = batch.id, owner = ?owner, "Download batch created");
                    return Ok(batch);
                }
                Err(StoreError::Duplicate(_)) => {
                    tracing::warn!(attempt, "Batch key collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::KeyGenerationExhausted { attempts })
    }

    pub async fn find_by_id(&self, id: DbId) -> Result<DownloadBatch, CoreError> {
        self.store
            .find_batch(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "download_batch",
                id,
            })
    }

    pub async fn find_by_key(&self, key: &str) -> Result<DownloadBatch, CoreError> {
        self.store
            .find_batch_by_key(key)
            .await?
            .ok_or_else(|| CoreError::Validation(format!("Unknown batch key '{key}'")))
    }

    /// Mark or unmark parts of one directory.
    ///
    /// Selections name files of `node`'s listing, which is populated on
    /// demand; callers on an async runtime should populate it beforehand.
    pub async fn toggle_parts(
        &self,
        tree: &DirectoryTree,
        batch: &DownloadBatch,
        node: &DirectoryNode,
        selections: &[PartSelection],
    ) -> Result<ToggleSummary, CoreError> {
        if batch.state != BatchState::Open {
            return Err(CoreError::Conflict(format!(
                "Batch is {} and no longer accepts changes",
                batch.state.as_str()
            )));
        }
        if !node.accessible {
            return Err(CoreError::PathDenied);
        }

        let listing = tree.listing(node);
        let mut toggles = Vec::with_capacity(selections.len());

        for selection in selections {
            let part = listing
                .parts
                .iter()
                .find(|p| p.file_name == selection.name)
                .ok_or_else(|| {
                    CoreError::Validation(format!("Unknown part '{}'", selection.name))
                })?;

            let hash = part.content_hash();
            if selection.mark {
                let allowed = listing
                    .parts
                    .iter()
                    .any(|p| p.accessible && p.content_hash() == hash);
                if !allowed {
                    return Err(CoreError::Forbidden(format!(
                        "Part '{}' is not available to you",
                        part.file_name
                    )));
                }
            }

            toggles.push(PartToggle {
                ds_name: part.ds_name.clone(),
                dir_path: part.dir_path.clone(),
                name: part.file_name.clone(),
                hash,
                mark: selection.mark,
            });
        }

        let outcomes = self
            .store
            .toggle_parts(batch.id, &toggles)
            .await
            .map_err(conflict_or_store)?;
        let summary = outcomes
            .iter()
            .fold(ToggleSummary::default(), |mut acc, outcome| {
                match outcome {
                    ToggleOutcome::Marked => acc.marked += 1,
                    ToggleOutcome::Unmarked => acc.unmarked += 1,
                    ToggleOutcome::Unchanged => {}
                }
                acc
            });

        tree.invalidate(node.ds_name(), node.full_path(), node.viewer.identity());
        tracing::debug!(
            batch_id = batch.id,
            ds = %node.ds_name(),
            path = %node.full_path(),
            marked = summary.marked,
            unmarked = summary.unmarked,
            "Toggled batch parts",
        );

        Ok(summary)
    }

    /// Names of the batch's parts inside `node`.
    pub async fn marked_in(
        &self,
        batch: &DownloadBatch,
        node: &DirectoryNode,
    ) -> Result<HashSet<String>, CoreError> {
        let parts = self
            .store
            .marked_parts(batch.id, node.ds_name(), node.full_path())
            .await?;
        Ok(parts.into_iter().map(|p| p.name).collect())
    }

    /// Move an `OPEN` or `ERROR` batch with at least one part to
    /// `PREPARING`. Only one caller wins the transition; the others get
    /// [`CoreError::Conflict`].
    pub async fn prepare_build(&self, batch: &DownloadBatch) -> Result<DownloadBatch, CoreError> {
        if !matches!(batch.state, BatchState::Open | BatchState::Error) {
            return Err(CoreError::Conflict(format!(
                "Batch is {} and cannot be built",
                batch.state.as_str()
            )));
        }
        if self.store.batch_parts(batch.id).await?.is_empty() {
            return Err(CoreError::Validation("Batch has no parts".to_string()));
        }

        self.transition(
            batch.id,
            &[BatchState::Open, BatchState::Error],
            BatchState::Preparing,
            None,
        )
        .await
    }

    /// [`Self::prepare_build`], then build the archive on a tracked task.
    pub async fn start_build(&self, batch: &DownloadBatch) -> Result<DownloadBatch, CoreError> {
        let preparing = self.prepare_build(batch).await?;

        let engine = self.clone();
        let batch_id = batch.id;
        self.builds.spawn(async move {
            if let Err(e) = engine.run_build(batch_id).await {
                tracing::debug!(batch_id, error = %e, "Detached batch build ended with an error");
            }
        });

        Ok(preparing)
    }

    /// Build the archive of a `PREPARING` batch and persist `DONE` or
    /// `ERROR`.
    pub async fn run_build(&self, batch_id: DbId) -> Result<DownloadBatch, CoreError> {
        let batch = self.find_by_id(batch_id).await?;
        if batch.state != BatchState::Preparing {
            return Err(CoreError::Conflict(format!(
                "Batch is {} and not being prepared",
                batch.state.as_str()
            )));
        }

        tracing::info!(batch_id, key = %batch.key, "Building batch archive");

        match self.write_archive(&batch).await {
            Ok(zip_file) => {
                let done = self
                    .transition(
                        batch_id,
                        &[BatchState::Preparing],
                        BatchState::Done,
                        Some(&zip_file),
                    )
                    .await?;
                tracing::info!(batch_id, zip_file = %zip_file, "Batch archive ready");
                Ok(done)
            }
            Err(e) => {
                tracing::error!(batch_id, error = %e, "Batch archive build failed");
                self.transition(batch_id, &[BatchState::Preparing], BatchState::Error, None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Wait for every detached build started so far.
    pub async fn wait_for_builds(&self) {
        self.builds.close();
        self.builds.wait().await;
    }

    /// Fail `PREPARING` batches last touched more than `older_than` ago, so
    /// a build lost to a restart can be started again. Returns how many were
    /// failed.
    pub async fn fail_stale_builds(&self, older_than: Duration) -> Result<usize, CoreError> {
        let cutoff = cutoff(older_than)?;
        let stale = self
            .store
            .batches_in_state_older_than(BatchState::Preparing, cutoff)
            .await?;

        let mut failed = 0;
        for batch in stale {
            let moved = self
                .store
                .transition_batch(batch.id, &[BatchState::Preparing], BatchState::Error, None)
                .await?;
            if moved.is_some() {
                tracing::warn!(batch_id = batch.id, "Failed stale batch build");
                failed += 1;
            }
        }

        Ok(failed)
    }

    async fn transition(
        &self,
        batch_id: DbId,
        from: &[BatchState],
        to: BatchState,
        zip_file: Option<&str>,
    ) -> Result<DownloadBatch, CoreError> {
        self.store
            .transition_batch(batch_id, from, to, zip_file)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "Batch {batch_id} changed state before it could become {}",
                    to.as_str()
                ))
            })
    }

    async fn write_archive(&self, batch: &DownloadBatch) -> Result<String, CoreError> {
        let parts = self.store.batch_parts(batch.id).await?;

        let mut files = Vec::with_capacity(parts.len());
        for part in &parts {
            let dir = paths::resolve(&self.settings, &part.ds_name, &part.dir_path)?;
            files.push((paths::resolve_file(&dir, &part.name)?, part.name.clone()));
        }

        let zip_file = archive::archive_file(batch);
        let destination = self.settings.download_root.join(&zip_file);
        let folder = archive::archive_name(batch.id);

        tokio::task::spawn_blocking(move || archive::write_archive(&destination, &folder, &files))
            .await
            .map_err(|e| CoreError::Internal(format!("Archive task failed: {e}")))??;

        Ok(zip_file)
    }

    /// Absolute path of a built archive.
    pub fn archive_path(&self, batch: &DownloadBatch) -> Option<PathBuf> {
        batch
            .zip_file
            .as_ref()
            .map(|zip| self.settings.download_root.join(zip))
    }

    /// Close `DONE` batches last touched more than `older_than` ago and
    /// delete their archives. Returns how many were closed.
    pub async fn cleanup(&self, older_than: Duration) -> Result<usize, CoreError> {
        let cutoff = cutoff(older_than)?;
        let batches = self
            .store
            .batches_in_state_older_than(BatchState::Done, cutoff)
            .await?;

        let mut closed = 0;
        for batch in batches {
            let moved = self
                .store
                .transition_batch(batch.id, &[BatchState::Done], BatchState::Closed, None)
                .await?;
            if moved.is_none() {
                continue;
            }
            if let Some(path) = self.archive_path(&batch) {
                remove_archive(&path).await;
            }
            tracing::info!(batch_id = batch.id, "Closed expired batch");
            closed += 1;
        }

        Ok(closed)
    }

    pub async fn snapshot(&self, batch: &DownloadBatch) -> Result<BatchSnapshot, CoreError> {
        let parts = self.store.batch_parts(batch.id).await?;

        let mut approximate_size = 0;
        for part in &parts {
            let Some(ds) = self.settings.data_source(&part.ds_name) else {
                continue;
            };
            let path = ds.root.join(&part.dir_path).join(&part.name);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                approximate_size += meta.len();
            }
        }

        let real_size = match (batch.state, self.archive_path(batch)) {
            (BatchState::Done, Some(path)) => tokio::fs::metadata(&path).await.ok().map(|m| m.len()),
            _ => None,
        };

        Ok(BatchSnapshot {
            key: batch.key.clone(),
            state: batch.state,
            part_count: parts.len(),
            approximate_size,
            real_size,
        })
    }
}

fn cutoff(older_than: Duration) -> Result<Timestamp, CoreError> {
    let age = chrono::Duration::from_std(older_than)
        .map_err(|e| CoreError::Validation(format!("Invalid age: {e}")))?;
    Ok(chrono::Utc::now() - age)
}

/// A store-side state check failing is a conflict, not a backend error.
fn conflict_or_store(err: StoreError) -> CoreError {
    match err {
        StoreError::Conflict(msg) => CoreError::Conflict(msg),
        other => other.into(),
    }
}

/// Delete an archive and its per-batch directory, tolerating either being gone.
async fn remove_archive(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove archive");
        }
    }
    if let Some(dir) = path.parent() {
        if let Err(e) = tokio::fs::remove_dir(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to remove archive directory");
            }
        }
    }
}
