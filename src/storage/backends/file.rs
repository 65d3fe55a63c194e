//! File-based storage backend implementation
//!
//! Layout under the base directory:
//!
//! ```text
//! {data_dir}/
//! ├── foods.json      # reference rows, per 100 units
//! └── entries.json    # logged entries
//! ```
//!
//! Every operation reads the files from disk, so the files stay the only
//! source of truth. Writes go to a temp file that is renamed into place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::storage::{
    config::StoreConfig,
    error::{StorageError, StorageResult},
    traits::FoodStore,
    types::*,
};

const FOODS_FILE: &str = "foods.json";
const ENTRIES_FILE: &str = "entries.json";

/// File-based storage backend
pub struct FileBackend {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a new file backend
    pub async fn new(config: &StoreConfig) -> StorageResult<Self> {
        Self::open(config.data_dir.clone()).await
    }

    /// Open (and create if needed) a store rooted at `base_dir`
    pub async fn open(base_dir: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&base_dir).await?;

        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Read a JSON array file, treating a missing file as empty
    async fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> StorageResult<Vec<T>> {
        let path = self.base_dir.join(name);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::serialization(format!("{}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Write JSON file atomically
    async fn write_json<T: Serialize>(&self, name: &str, data: &T) -> StorageResult<()> {
        let path = self.base_dir.join(name);
        let temp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(data)?;
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl FoodStore for FileBackend {
    async fn lookup(&self, query: &str, limit: usize) -> StorageResult<Vec<Candidate>> {
        let foods: Vec<ReferenceFood> = self.read_json(FOODS_FILE).await?;
        let mut matches: Vec<Candidate> = foods
            .into_iter()
            .filter(|f| name_matches(&f.name, query))
            .map(|f| Candidate {
                id: f.id,
                name: f.name,
            })
            .collect();
        matches.sort_by_key(|c| c.id);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn get_reference(&self, id: FoodId) -> StorageResult<Option<ReferenceFood>> {
        let foods: Vec<ReferenceFood> = self.read_json(FOODS_FILE).await?;
        Ok(foods.into_iter().find(|f| f.id == id))
    }

    async fn append_entry(&self, entry: NewEntry) -> StorageResult<EntryId> {
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<PersistedEntry> = self.read_json(ENTRIES_FILE).await?;

        if let Some(existing) = entries
            .iter()
            .find(|e| e.idempotency_key == entry.idempotency_key)
        {
            debug!(
                "Entry for record {} already exists as {}",
                entry.idempotency_key, existing.id
            );
            return Ok(existing.id);
        }

        let id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        entries.push(PersistedEntry::from_new(id, entry));

        self.write_json(ENTRIES_FILE, &entries)
            .await
            .map_err(|e| StorageError::not_committed(format!("entry {id}: {e}")))?;

        debug!("Appended entry {} to {}", id, self.base_dir.display());
        Ok(id)
    }

    async fn list_entries(&self, query: EntryQuery) -> StorageResult<Vec<PersistedEntry>> {
        let entries: Vec<PersistedEntry> = self.read_json(ENTRIES_FILE).await?;
        let mut entries: Vec<PersistedEntry> = entries
            .into_iter()
            .filter(|e| query.matches(&e.consumed_at))
            .collect();
        entries.sort_by(|a, b| a.consumed_at.cmp(&b.consumed_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn insert_food(&self, food: NewFood) -> StorageResult<FoodId> {
        let _guard = self.write_lock.lock().await;
        let mut foods: Vec<ReferenceFood> = self.read_json(FOODS_FILE).await?;

        let id = foods.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        foods.push(ReferenceFood {
            id,
            name: food.name,
            per_100: food.per_100,
        });
        self.write_json(FOODS_FILE, &foods).await?;
        Ok(id)
    }

    async fn entry_count(&self) -> StorageResult<usize> {
        let entries: Vec<PersistedEntry> = self.read_json(ENTRIES_FILE).await?;
        Ok(entries.len())
    }
}
