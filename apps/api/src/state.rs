use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::Oracle;
use crate::workflow::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Backs every discovery, detail and analysis call. `LlmClient` in production.
    pub oracle: Arc<dyn Oracle>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, oracle: Arc<dyn Oracle>) -> Self {
        Self {
            config,
            oracle,
            sessions: SessionStore::new(),
        }
    }
}
