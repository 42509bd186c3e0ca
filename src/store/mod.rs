//! Local store: the durable, offline-first half of promptkit's storage.
//!
//! Two engines sit behind the [`LocalStore`] trait:
//!
//! - **SQLite** (`database-sqlite` feature): durable storage on disk.
//! - **Memory**: process-local storage for tests and throwaway sessions.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! type = "sqlite"
//! path = "promptkit.db"
//! wal_mode = true
//! ```

mod error;
mod memory;
mod schema;
#[cfg(feature = "database-sqlite")]
mod sqlite;
mod traits;

use std::sync::Arc;

pub use error::*;
pub use memory::MemoryLocalStore;
pub use schema::*;
#[cfg(feature = "database-sqlite")]
pub use sqlite::SqliteLocalStore;
pub use traits::LocalStore;

use crate::config::StorageConfig;

/// Build and initialize the configured local store.
pub async fn create_local_store(config: &StorageConfig) -> StoreResult<Arc<dyn LocalStore>> {
    let store: Arc<dyn LocalStore> = match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory local store; data will not survive a restart");
            Arc::new(MemoryLocalStore::new())
        }
        #[cfg(feature = "database-sqlite")]
        StorageConfig::Sqlite(cfg) => {
            tracing::info!(path = %cfg.path, "Using SQLite local store");
            Arc::new(SqliteLocalStore::new(cfg.clone()))
        }
        #[cfg(not(feature = "database-sqlite"))]
        StorageConfig::Sqlite(_) => {
            return Err(StoreError::Unsupported(
                "storage.type = \"sqlite\" requires the 'database-sqlite' feature".into(),
            ));
        }
    };

    store.init().await?;
    Ok(store)
}
