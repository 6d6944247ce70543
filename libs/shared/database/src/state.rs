use std::sync::Arc;

use shared_config::AppConfig;

use crate::memory::InMemoryDocumentStore;
use crate::store::DocumentStore;

/// Shared handler state: configuration plus the document store every cell
/// reads and writes through.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(InMemoryDocumentStore::new()))
    }
}
