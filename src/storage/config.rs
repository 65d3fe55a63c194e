//! Storage configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// JSON files under the data directory (default)
    #[default]
    File,
    /// Memory storage (for testing)
    Memory,
    /// SQLite database, requires the `sqlite` feature
    Sqlite,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Food store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: BackendType,

    /// Directory holding `foods.json` and `entries.json` for the file backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Connection URL for the SQLite backend; defaults to `nutrition.db` in `data_dir`
    #[serde(default)]
    pub sqlite_url: Option<String>,

    /// Maximum number of candidates returned by a lookup
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            data_dir: default_data_dir(),
            sqlite_url: None,
            lookup_limit: default_lookup_limit(),
        }
    }
}

impl StoreConfig {
    /// Memory-backed configuration for tests
    pub fn memory() -> Self {
        Self {
            backend: BackendType::Memory,
            ..Self::default()
        }
    }

    /// File-backed configuration rooted at `data_dir`
    pub fn file(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendType::File,
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// SQLite URL to connect to
    pub fn resolved_sqlite_url(&self) -> String {
        self.sqlite_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}", self.data_dir.join("nutrition.db").display())
        })
    }
}

pub(crate) fn default_data_dir() -> PathBuf {
    crate::config::default_data_dir()
}

fn default_lookup_limit() -> usize {
    10
}
