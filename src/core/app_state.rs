use std::sync::Arc;

use crate::core::config::RefinerSettings;
use crate::runs::RunRegistry;
use crate::store::LinkStore;

/// Shared application state for the HTTP service layer.
///
/// The run registry lives here, owned by the service layer; crawl engines
/// built per run report back through it rather than through any global.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub store: Arc<LinkStore>,
    pub runs: Arc<RunRegistry>,
    pub refiner_settings: RefinerSettings,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store_backend", &self.store.backend())
            .field("refiner_enabled", &self.refiner_settings.api_key.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client, store: Arc<LinkStore>) -> Self {
        Self {
            http_client,
            store,
            runs: Arc::new(RunRegistry::new()),
            refiner_settings: RefinerSettings::from_env(),
        }
    }

    pub fn with_refiner_settings(mut self, settings: RefinerSettings) -> Self {
        self.refiner_settings = settings;
        self
    }
}
