//! Durable food store
//!
//! The store holds the reference nutrition table and the log of confirmed
//! entries. It is read by candidate resolution and macro calculation and
//! written only by the persistence writer.

pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod ingest;
pub mod traits;
pub mod types;

pub use backends::{FileBackend, MemoryBackend};
#[cfg(feature = "sqlite")]
pub use backends::SqliteBackend;
pub use config::{BackendType, StoreConfig};
pub use error::{StorageError, StorageResult};
pub use factory::StorageFactory;
pub use ingest::{ingest_csv, IngestStats};
pub use traits::FoodStore;
pub use types::{
    Candidate, EntryId, EntryQuery, FoodId, Macros, NewEntry, NewFood, PersistedEntry,
    ReferenceFood,
};
