//! Store construction from configuration.

use std::{path::Path, sync::Arc, time::Duration};

use tracing::debug;

use super::types::{Config, StoreBackend};
use crate::{
    store::{MemoryStore, SqliteStore, Store},
    Result,
};

/// Build the configured backend.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    config.validate()?;

    match config.store.backend {
        StoreBackend::Memory => {
            debug!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            debug!(path = %config.store.path, "Opening sqlite store");
            let store = SqliteStore::open(
                Path::new(&config.store.path),
                Duration::from_millis(config.store.busy_timeout_ms),
                config.store.max_connections,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
