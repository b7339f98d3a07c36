//! Periodic closing of expired download batches.
//!
//! `DONE` batches untouched for longer than the retention period are set to
//! `CLOSED` and their archives deleted. Builds stuck in `PREPARING` longer
//! than the build timeout are moved to `ERROR` so they can be retried. Runs on a fixed interval using
//! `tokio::time::interval`; the first sweep happens at startup.

use std::sync::Arc;
use std::time::Duration;

use partvault_core::batch::DownloadBatchEngine;
use partvault_core::tree::DirectoryTree;
use tokio_util::sync::CancellationToken;

/// Run the cleanup loop until `cancel` is triggered. Each tick also drops
/// expired directory cache entries.
pub async fn run(
    engine: DownloadBatchEngine,
    tree: Arc<DirectoryTree>,
    retention: Duration,
    build_timeout: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Batch cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Batch cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match engine.fail_stale_builds(build_timeout).await {
                    Ok(failed) if failed > 0 => {
                        tracing::warn!(failed, "Batch cleanup: failed stale builds");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Failing stale builds failed"),
                }

                match engine.cleanup(retention).await {
                    Ok(closed) if closed > 0 => {
                        tracing::info!(closed, "Batch cleanup: closed expired batches");
                    }
                    Ok(_) => tracing::debug!("Batch cleanup: nothing to close"),
                    Err(e) => tracing::error!(error = %e, "Batch cleanup failed"),
                }

                let purged = tree.cache().purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired directory cache entries");
                }
            }
        }
    }
}
