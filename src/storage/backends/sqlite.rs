//! SQLite storage backend implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{
    config::StoreConfig,
    error::{StorageError, StorageResult},
    traits::FoodStore,
    types::*,
};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Create new SQLite backend
    pub async fn new(config: &StoreConfig) -> StorageResult<Self> {
        Self::connect(&config.resolved_sqlite_url()).await
    }

    /// Connect to `url`, creating the database file and schema if needed
    pub async fn connect(url: &str) -> StorageResult<Self> {
        info!("Initializing SQLite backend at {}", url);

        let connect_options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::configuration(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        // each connection to an in-memory database sees its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::database(format!("Failed to open database: {}", e)))?;

        let backend = Self { pool };
        backend.initialize_schema().await?;
        Ok(backend)
    }

    async fn initialize_schema(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS food_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                calories REAL NOT NULL,
                protein REAL NOT NULL,
                carbs REAL NOT NULL,
                fat REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_food_items_name ON food_items (name)")
            .execute(&self.pool)
            .await
            .map_err(Self::sql_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                idempotency_key TEXT NOT NULL UNIQUE,
                food_id INTEGER REFERENCES food_items (id),
                name TEXT NOT NULL,
                quantity REAL NOT NULL,
                unit TEXT NOT NULL,
                calories REAL NOT NULL,
                protein REAL NOT NULL,
                carbs REAL NOT NULL,
                fat REAL NOT NULL,
                consumed_at TEXT NOT NULL,
                consumed_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                original_text TEXT NOT NULL,
                meal_type TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_daily_logs_date ON daily_logs (consumed_date)",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        // Databases created before meal types were recorded
        let has_meal_type: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('daily_logs') WHERE name = 'meal_type'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Self::sql_error)?;
        if has_meal_type == 0 {
            sqlx::query("ALTER TABLE daily_logs ADD COLUMN meal_type TEXT")
                .execute(&self.pool)
                .await
                .map_err(Self::sql_error)?;
            info!("Added meal_type column to daily_logs");
        }

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Convert SQL error to storage error
    fn sql_error(e: sqlx::Error) -> StorageError {
        match e {
            sqlx::Error::RowNotFound => StorageError::not_found("Record not found"),
            other => StorageError::database(other),
        }
    }

    fn entry_from_row(row: &SqliteRow) -> StorageResult<PersistedEntry> {
        let key: String = row.try_get("idempotency_key").map_err(Self::sql_error)?;
        let consumed_at: String = row.try_get("consumed_at").map_err(Self::sql_error)?;
        let created_at: String = row.try_get("created_at").map_err(Self::sql_error)?;

        Ok(PersistedEntry {
            id: row.try_get("id").map_err(Self::sql_error)?,
            idempotency_key: Uuid::parse_str(&key).map_err(StorageError::serialization)?,
            provenance_id: row.try_get("food_id").map_err(Self::sql_error)?,
            name: row.try_get("name").map_err(Self::sql_error)?,
            quantity: row.try_get("quantity").map_err(Self::sql_error)?,
            unit: row.try_get("unit").map_err(Self::sql_error)?,
            macros: Macros::new(
                row.try_get("calories").map_err(Self::sql_error)?,
                row.try_get("protein").map_err(Self::sql_error)?,
                row.try_get("carbs").map_err(Self::sql_error)?,
                row.try_get("fat").map_err(Self::sql_error)?,
            ),
            consumed_at: parse_timestamp(&consumed_at)?,
            created_at: parse_timestamp(&created_at)?,
            raw_text: row.try_get("original_text").map_err(Self::sql_error)?,
            meal_type: row.try_get("meal_type").map_err(Self::sql_error)?,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::serialization(format!("bad timestamp '{}': {}", value, e)))
}

/// Escape LIKE wildcards so the query is matched literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl FoodStore for SqliteBackend {
    async fn lookup(&self, query: &str, limit: usize) -> StorageResult<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, name FROM food_items WHERE name LIKE ? ESCAPE '\\' ORDER BY id LIMIT ?",
        )
        .bind(like_pattern(query))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        rows.iter()
            .map(|row| {
                Ok(Candidate {
                    id: row.try_get("id").map_err(Self::sql_error)?,
                    name: row.try_get("name").map_err(Self::sql_error)?,
                })
            })
            .collect()
    }

    async fn get_reference(&self, id: FoodId) -> StorageResult<Option<ReferenceFood>> {
        let row = sqlx::query(
            "SELECT id, name, calories, protein, carbs, fat FROM food_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        row.map(|row| {
            Ok(ReferenceFood {
                id: row.try_get("id").map_err(Self::sql_error)?,
                name: row.try_get("name").map_err(Self::sql_error)?,
                per_100: Macros::new(
                    row.try_get("calories").map_err(Self::sql_error)?,
                    row.try_get("protein").map_err(Self::sql_error)?,
                    row.try_get("carbs").map_err(Self::sql_error)?,
                    row.try_get("fat").map_err(Self::sql_error)?,
                ),
            })
        })
        .transpose()
    }

    async fn append_entry(&self, entry: NewEntry) -> StorageResult<EntryId> {
        let key = entry.idempotency_key.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::not_committed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO daily_logs (
                idempotency_key, food_id, name, quantity, unit,
                calories, protein, carbs, fat,
                consumed_at, consumed_date, created_at, original_text, meal_type
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(&key)
        .bind(entry.provenance_id)
        .bind(&entry.name)
        .bind(entry.quantity)
        .bind(&entry.unit)
        .bind(entry.macros.calories)
        .bind(entry.macros.protein)
        .bind(entry.macros.carbs)
        .bind(entry.macros.fat)
        .bind(entry.consumed_at.to_rfc3339())
        .bind(entry.consumed_at.date_naive().to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(&entry.raw_text)
        .bind(&entry.meal_type)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::not_committed(e.to_string()))?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM daily_logs WHERE idempotency_key = ?")
            .bind(&key)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::not_committed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::not_committed(e.to_string()))?;

        debug!("Appended entry {} for record {}", id, key);
        Ok(id)
    }

    async fn list_entries(&self, query: EntryQuery) -> StorageResult<Vec<PersistedEntry>> {
        let (start, end) = match query {
            EntryQuery::Day(day) => (day, day),
            EntryQuery::Range { start, end } => (start, end),
        };

        let rows = sqlx::query(
            r#"
            SELECT * FROM daily_logs
            WHERE consumed_date >= ? AND consumed_date <= ?
            ORDER BY consumed_at, id
            "#,
        )
        .bind(start.to_string())
        .bind(end.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn insert_food(&self, food: NewFood) -> StorageResult<FoodId> {
        let result = sqlx::query(
            "INSERT INTO food_items (name, calories, protein, carbs, fat) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&food.name)
        .bind(food.per_100.calories)
        .bind(food.per_100.protein)
        .bind(food.per_100.carbs)
        .bind(food.per_100.fat)
        .execute(&self.pool)
        .await
        .map_err(Self::sql_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn entry_count(&self) -> StorageResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(Self::sql_error)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> SqliteBackend {
        SqliteBackend::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_fat"), "%50\\%\\_fat%");
        assert_eq!(like_pattern(" egg "), "%egg%");
    }

    #[tokio::test]
    async fn test_lookup_and_reference() {
        let store = backend().await;
        let id = store
            .insert_food(NewFood {
                name: "Egg, boiled".to_string(),
                per_100: Macros::new(155.0, 13.0, 1.1, 11.0),
            })
            .await
            .unwrap();

        let found = store.lookup("EGG", 10).await.unwrap();
        assert_eq!(found, vec![Candidate { id, name: "Egg, boiled".to_string() }]);

        let reference = store.get_reference(id).await.unwrap().unwrap();
        assert_eq!(reference.per_100.protein, 13.0);
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = backend().await;
        let entry = NewEntry {
            idempotency_key: Uuid::new_v4(),
            provenance_id: None,
            name: "stew".to_string(),
            quantity: 300.0,
            unit: "g".to_string(),
            macros: Macros::new(420.0, 30.0, 35.0, 15.0),
            consumed_at: Utc::now(),
            raw_text: "a bowl of stew".to_string(),
            meal_type: Some("dinner".to_string()),
        };

        let first = store.append_entry(entry.clone()).await.unwrap();
        let second = store.append_entry(entry.clone()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.entry_count().await.unwrap(), 1);

        let listed = store
            .list_entries(EntryQuery::Day(entry.consumed_at.date_naive()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].provenance_id, None);
        assert_eq!(listed[0].meal_type.as_deref(), Some("dinner"));
    }
}
