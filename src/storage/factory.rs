//! Storage factory for creating store instances

use std::sync::Arc;

use super::backends::{FileBackend, MemoryBackend};
#[cfg(feature = "sqlite")]
use super::backends::SqliteBackend;
use super::config::{BackendType, StoreConfig};
use super::error::StorageResult;
use super::traits::FoodStore;

/// Factory for creating store instances
pub struct StorageFactory;

impl StorageFactory {
    /// Create a store from explicit configuration
    pub async fn from_config(config: &StoreConfig) -> StorageResult<Arc<dyn FoodStore>> {
        match config.backend {
            BackendType::File => {
                let backend = FileBackend::new(config).await?;
                Ok(Arc::new(backend))
            }
            BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let backend = SqliteBackend::new(config).await?;
                Ok(Arc::new(backend))
            }
            #[cfg(not(feature = "sqlite"))]
            BackendType::Sqlite => Err(super::error::StorageError::configuration(
                "SQLite backend not enabled. Enable with --features sqlite",
            )),
        }
    }
}
