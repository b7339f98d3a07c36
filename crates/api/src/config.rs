use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. Without it batches live in memory.
    pub database_url: Option<String>,
    /// `DONE` batches untouched this long are closed (default: one day).
    pub batch_retention_secs: u64,
    /// Interval of the batch cleanup sweep (default: one hour).
    pub batch_cleanup_interval_secs: u64,
    /// `PREPARING` batches older than this are failed by the sweep (default: one hour).
    pub build_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `3000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `DATABASE_URL`                | -- (in-memory store)       |
    /// | `BATCH_RETENTION_SECS`        | `86400`                    |
    /// | `BATCH_CLEANUP_INTERVAL_SECS` | `3600`                     |
    /// | `BUILD_TIMEOUT_SECS`          | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: u64_var("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: u64_var("SHUTDOWN_TIMEOUT_SECS", 30),
            database_url,
            batch_retention_secs: u64_var("BATCH_RETENTION_SECS", 86_400),
            batch_cleanup_interval_secs: u64_var("BATCH_CLEANUP_INTERVAL_SECS", 3_600),
            build_timeout_secs: u64_var("BUILD_TIMEOUT_SECS", 3_600),
            jwt: JwtConfig::from_env(),
        }
    }
}

fn u64_var(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
}
