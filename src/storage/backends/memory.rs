//! In-memory storage backend for testing

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::storage::{
    error::StorageResult,
    traits::FoodStore,
    types::*,
};

#[derive(Default)]
struct MemoryState {
    foods: Vec<ReferenceFood>,
    entries: Vec<PersistedEntry>,
}

/// In-memory storage backend for testing
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    /// Create an empty memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory backend pre-populated with reference rows, ids starting at 1
    pub fn with_foods(foods: Vec<NewFood>) -> Self {
        let foods = foods
            .into_iter()
            .enumerate()
            .map(|(i, food)| ReferenceFood {
                id: i as FoodId + 1,
                name: food.name,
                per_100: food.per_100,
            })
            .collect();

        Self {
            state: Arc::new(RwLock::new(MemoryState {
                foods,
                entries: Vec::new(),
            })),
        }
    }

    /// Insert a reference row with an explicit id
    pub async fn insert_food_with_id(&self, food: ReferenceFood) {
        let mut state = self.state.write().await;
        state.foods.retain(|f| f.id != food.id);
        state.foods.push(food);
        state.foods.sort_by_key(|f| f.id);
    }
}

#[async_trait]
impl FoodStore for MemoryBackend {
    async fn lookup(&self, query: &str, limit: usize) -> StorageResult<Vec<Candidate>> {
        let state = self.state.read().await;
        let mut matches: Vec<Candidate> = state
            .foods
            .iter()
            .filter(|f| name_matches(&f.name, query))
            .map(|f| Candidate {
                id: f.id,
                name: f.name.clone(),
            })
            .collect();
        matches.sort_by_key(|c| c.id);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn get_reference(&self, id: FoodId) -> StorageResult<Option<ReferenceFood>> {
        let state = self.state.read().await;
        Ok(state.foods.iter().find(|f| f.id == id).cloned())
    }

    async fn append_entry(&self, entry: NewEntry) -> StorageResult<EntryId> {
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .entries
            .iter()
            .find(|e| e.idempotency_key == entry.idempotency_key)
        {
            debug!(
                "Entry for record {} already exists as {}",
                entry.idempotency_key, existing.id
            );
            return Ok(existing.id);
        }

        let id = state.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        state.entries.push(PersistedEntry::from_new(id, entry));
        Ok(id)
    }

    async fn list_entries(&self, query: EntryQuery) -> StorageResult<Vec<PersistedEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<PersistedEntry> = state
            .entries
            .iter()
            .filter(|e| query.matches(&e.consumed_at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.consumed_at.cmp(&b.consumed_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn insert_food(&self, food: NewFood) -> StorageResult<FoodId> {
        let mut state = self.state.write().await;
        let id = state.foods.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        state.foods.push(ReferenceFood {
            id,
            name: food.name,
            per_100: food.per_100,
        });
        Ok(id)
    }

    async fn entry_count(&self) -> StorageResult<usize> {
        Ok(self.state.read().await.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(key: Uuid) -> NewEntry {
        NewEntry {
            idempotency_key: key,
            provenance_id: Some(1),
            name: "apple".to_string(),
            quantity: 150.0,
            unit: "g".to_string(),
            macros: Macros::new(78.0, 0.45, 20.7, 0.3),
            consumed_at: Utc::now(),
            raw_text: "an apple".to_string(),
            meal_type: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_is_ordered_and_limited() {
        let store = MemoryBackend::with_foods(vec![
            NewFood {
                name: "Chicken breast".to_string(),
                per_100: Macros::new(165.0, 31.0, 0.0, 3.6),
            },
            NewFood {
                name: "Apple".to_string(),
                per_100: Macros::new(52.0, 0.3, 13.8, 0.2),
            },
            NewFood {
                name: "Chicken thigh".to_string(),
                per_100: Macros::new(209.0, 26.0, 0.0, 10.9),
            },
        ]);

        let found = store.lookup("chicken", 10).await.unwrap();
        assert_eq!(
            found.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 3]
        );

        let limited = store.lookup("chicken", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].name, "Chicken breast");
    }

    #[tokio::test]
    async fn test_append_is_idempotent_on_key() {
        let store = MemoryBackend::new();
        let key = Uuid::new_v4();

        let first = store.append_entry(entry(key)).await.unwrap();
        let second = store.append_entry(entry(key)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.entry_count().await.unwrap(), 1);

        store.append_entry(entry(Uuid::new_v4())).await.unwrap();
        assert_eq!(store.entry_count().await.unwrap(), 2);
    }
}
