use std::sync::Arc;

use partvault_core::acl::{ExternalAuthenticator, NoExternalAuth};
use partvault_core::batch::{BatchStore, DownloadBatchEngine};
use partvault_core::settings::Settings;
use partvault_core::thumbnails::{DirectThumbnails, ThumbnailRenderer};
use partvault_core::tree::DirectoryTree;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Data sources and reserved file names.
    pub settings: Arc<Settings>,
    /// Directory nodes and their cache, shared by all requests.
    pub tree: Arc<DirectoryTree>,
    pub batches: DownloadBatchEngine,
    /// Password check for users whose `source` is not `internal`.
    pub authenticator: Arc<dyn ExternalAuthenticator>,
    pub thumbnails: Arc<dyn ThumbnailRenderer>,
}

impl AppState {
    /// State with the direct thumbnail renderer and no external
    /// authenticator.
    pub fn new(
        config: ServerConfig,
        settings: Arc<Settings>,
        store: Arc<dyn BatchStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tree: Arc::new(DirectoryTree::new(Arc::clone(&settings))),
            batches: DownloadBatchEngine::new(store, Arc::clone(&settings)),
            authenticator: Arc::new(NoExternalAuth),
            thumbnails: Arc::new(DirectThumbnails::new(Arc::clone(&settings))),
            settings,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn ExternalAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }
}
