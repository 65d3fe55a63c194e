//! Store wrapper that can refuse writes

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::storage::{
    Candidate, EntryId, EntryQuery, FoodId, FoodStore, NewEntry, NewFood, PersistedEntry,
    ReferenceFood, StorageError, StorageResult,
};

/// Delegates to `inner`, except that entry appends fail while failing is on
pub struct FailingStore<S> {
    inner: S,
    failing: AtomicBool,
}

impl<S: FoodStore> FailingStore<S> {
    /// Wrap `inner` with appends failing
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: FoodStore> FoodStore for FailingStore<S> {
    async fn lookup(&self, query: &str, limit: usize) -> StorageResult<Vec<Candidate>> {
        self.inner.lookup(query, limit).await
    }

    async fn get_reference(&self, id: FoodId) -> StorageResult<Option<ReferenceFood>> {
        self.inner.get_reference(id).await
    }

    async fn append_entry(&self, entry: NewEntry) -> StorageResult<EntryId> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::not_committed("simulated write failure"));
        }
        self.inner.append_entry(entry).await
    }

    async fn list_entries(&self, query: EntryQuery) -> StorageResult<Vec<PersistedEntry>> {
        self.inner.list_entries(query).await
    }

    async fn insert_food(&self, food: NewFood) -> StorageResult<FoodId> {
        self.inner.insert_food(food).await
    }

    async fn entry_count(&self) -> StorageResult<usize> {
        self.inner.entry_count().await
    }
}
