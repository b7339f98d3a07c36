use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use partvault_core::batch::memory::MemoryBatchStore;
use partvault_core::batch::BatchStore;
use partvault_core::settings::Settings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partvault_api::background;
use partvault_api::config::ServerConfig;
use partvault_api::router::build_app_router;
use partvault_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partvault_api=debug,partvault_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let settings = Arc::new(Settings::from_env());
    tracing::info!(
        data_sources = settings.data_sources.len(),
        download_root = %settings.download_root.display(),
        "Loaded data source settings"
    );

    // --- Batch store ---
    let store: Arc<dyn BatchStore> = match &config.database_url {
        Some(database_url) => {
            let pool = partvault_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            partvault_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            partvault_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(partvault_db::PgBatchStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, batches are kept in memory");
            Arc::new(MemoryBatchStore::new())
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), settings, store);

    // --- Batch cleanup ---
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(background::batch_cleanup::run(
        state.batches.clone(),
        Arc::clone(&state.tree),
        Duration::from_secs(config.batch_retention_secs),
        Duration::from_secs(config.build_timeout_secs),
        Duration::from_secs(config.batch_cleanup_interval_secs),
        cleanup_cancel.clone(),
    ));

    let batches = state.batches.clone();

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cleanup_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        cleanup_handle,
    )
    .await;
    tracing::info!("Batch cleanup stopped");

    if tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        batches.wait_for_builds(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Timed out waiting for running batch builds");
    } else {
        tracing::info!("Running batch builds finished");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
