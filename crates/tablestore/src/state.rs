//! Shared application state passed to all request handlers.

use std::sync::Arc;

use tablestore_core::{storage::InMemoryStore, DynamicEntity, TableConnector};

/// Default table name when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "entities";

#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<TableConnector<DynamicEntity>>,
}

impl AppState {
    pub fn new(connector: TableConnector<DynamicEntity>) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(page_size: usize, default_table: &str) -> Self {
        let store = Arc::new(InMemoryStore::with_page_size(page_size));
        Self::new(TableConnector::new(store, default_table))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(
            tablestore_core::storage::memory::DEFAULT_PAGE_SIZE,
            DEFAULT_TABLE_NAME,
        )
    }
}
