//! Core trait definition for the durable food store

use async_trait::async_trait;

use super::error::StorageResult;
use super::types::*;

/// Durable store of reference foods and logged entries.
///
/// The store is the sole source of truth for logged food: reports are
/// always re-read from it after a write. Only the persistence writer calls
/// [`FoodStore::append_entry`].
#[async_trait]
pub trait FoodStore: Send + Sync {
    /// Reference rows whose name contains `query` (case-insensitive), ordered by id
    async fn lookup(&self, query: &str, limit: usize) -> StorageResult<Vec<Candidate>>;

    /// Load a reference row by id
    async fn get_reference(&self, id: FoodId) -> StorageResult<Option<ReferenceFood>>;

    /// Append a log entry.
    ///
    /// Idempotent on [`NewEntry::idempotency_key`]: when an entry with the
    /// same key already exists its id is returned and nothing is written.
    async fn append_entry(&self, entry: NewEntry) -> StorageResult<EntryId>;

    /// List log entries ordered by `consumed_at`
    async fn list_entries(&self, query: EntryQuery) -> StorageResult<Vec<PersistedEntry>>;

    /// Insert a reference row
    async fn insert_food(&self, food: NewFood) -> StorageResult<FoodId>;

    /// Total number of log entries
    async fn entry_count(&self) -> StorageResult<usize>;
}
