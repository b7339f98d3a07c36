//! Out-of-band batch maintenance against the shared database: rebuild a
//! batch archive or close expired batches.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use partvault_core::batch::DownloadBatchEngine;
use partvault_core::settings::Settings;
use partvault_core::types::DbId;
use partvault_db::PgBatchStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "partvault-worker")]
#[command(about = "PartVault batch maintenance")]
#[command(version)]
struct Args {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the archive of one batch and mark it done (or error)
    Build {
        /// Batch id
        batch_id: DbId,
    },
    /// Close done batches untouched for longer than the given age
    Cleanup {
        /// Age in seconds
        #[arg(default_value_t = 86_400)]
        older_than_secs: u64,
        /// Batches preparing for longer than this many seconds are failed
        #[arg(long, default_value_t = 3_600)]
        build_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partvault_worker=debug,partvault_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Arc::new(Settings::from_env());

    let pool = partvault_db::create_pool(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    partvault_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let engine = DownloadBatchEngine::new(Arc::new(PgBatchStore::new(pool)), settings);

    match args.command {
        Commands::Build { batch_id } => {
            let batch = engine
                .find_by_id(batch_id)
                .await
                .with_context(|| format!("Failed to load batch {batch_id}"))?;
            engine
                .prepare_build(&batch)
                .await
                .with_context(|| format!("Batch {batch_id} cannot be built"))?;
            let batch = engine
                .run_build(batch_id)
                .await
                .with_context(|| format!("Failed to build batch {batch_id}"))?;
            tracing::info!(
                batch_id,
                zip_file = batch.zip_file.as_deref().unwrap_or_default(),
                "Batch built",
            );
        }
        Commands::Cleanup {
            older_than_secs,
            build_timeout_secs,
        } => {
            let failed = engine
                .fail_stale_builds(Duration::from_secs(build_timeout_secs))
                .await
                .context("Failing stale builds failed")?;
            if failed > 0 {
                tracing::warn!(failed, build_timeout_secs, "Failed stale batch builds");
            }
            let closed = engine
                .cleanup(Duration::from_secs(older_than_secs))
                .await
                .context("Batch cleanup failed")?;
            tracing::info!(closed, older_than_secs, "Batch cleanup finished");
        }
    }

    Ok(())
}
