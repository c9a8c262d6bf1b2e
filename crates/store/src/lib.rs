//! Contact store implementations for Linkwise.

pub mod in_memory;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod sql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use linkwise_config::StoreConfig;
use linkwise_core::{ContactStore, StoreError};
use tracing::info;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Open the backend named in the configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn ContactStore>, StoreError> {
    let store: Arc<dyn ContactStore> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        #[cfg(feature = "sqlite")]
        "sqlite" => Arc::new(SqliteStore::open(&config.resolved_url(), config).await?),
        #[cfg(feature = "postgres")]
        "postgres" => Arc::new(PostgresStore::connect(&config.resolved_url(), config).await?),
        other => {
            return Err(StoreError::Unavailable(format!(
                "store backend '{other}' is not available in this build"
            )));
        }
    };
    info!(backend = store.name(), "Contact store ready");
    Ok(store)
}
