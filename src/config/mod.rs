//! Configuration for the fitpal CLI and library
//!
//! Values come from `config.toml` (see [`ConfigLoader`]) and are then
//! overridden by `FITPAL_*` environment variables.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;

pub use loader::ConfigLoader;

use crate::error::{ErrorCode, FitpalError, Result};
use crate::storage::{BackendType, StoreConfig};

/// Get the platform data directory for fitpal
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "fitpal", "fitpal")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".fitpal"))
}

/// Get the platform path of `config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "fitpal", "fitpal").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Which oracle implementation backs disambiguation and estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    /// Anthropic Messages API
    Claude,
    /// No remote oracle: multi-matches resolve to no match, estimation is unavailable
    #[default]
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub provider: OracleProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Upper bound for a single oracle call
    #[serde(default = "default_oracle_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout: default_oracle_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Decimal places kept for computed nutrient values
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Where suspended turns are checkpointed; defaults to `{data_dir}/checkpoints`
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            checkpoint_dir: None,
        }
    }
}

fn default_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_oracle_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_tokens() -> u32 {
    512
}

fn default_precision() -> u32 {
    2
}

/// Largest `agent.precision` accepted; beyond it rounding stops being exact in f64
pub const MAX_PRECISION: u32 = 10;

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply overrides from the process environment
    pub fn merge_env_vars(&mut self) {
        self.merge_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an environment lookup function
    pub fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("FITPAL_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }

        if let Some(backend) = lookup("FITPAL_STORE_BACKEND") {
            match backend.parse::<BackendType>() {
                Ok(value) => self.store.backend = value,
                Err(e) => tracing::warn!("Ignoring FITPAL_STORE_BACKEND: {}", e),
            }
        }

        if let Some(url) = lookup("FITPAL_SQLITE_URL") {
            self.store.sqlite_url = Some(url);
        }

        if let Some(log_level) = lookup("FITPAL_LOG_LEVEL") {
            self.log_level = Some(log_level);
        }

        if let Some(model) = lookup("FITPAL_MODEL") {
            self.oracle.model = model;
        }

        if let Some(api_key) = lookup("FITPAL_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY")) {
            self.oracle.api_key = Some(api_key);
            if lookup("FITPAL_ORACLE").is_none() {
                self.oracle.provider = OracleProvider::Claude;
            }
        }

        if let Some(provider) = lookup("FITPAL_ORACLE") {
            match provider.trim().to_lowercase().as_str() {
                "claude" => self.oracle.provider = OracleProvider::Claude,
                "offline" => self.oracle.provider = OracleProvider::Offline,
                other => tracing::warn!("Ignoring FITPAL_ORACLE: unknown provider '{}'", other),
            }
        }
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.agent.precision > MAX_PRECISION {
            return Err(FitpalError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!(
                    "agent.precision must be between 0 and {}, got {}",
                    MAX_PRECISION, self.agent.precision
                ),
            ));
        }
        Ok(())
    }

    /// Directory holding turn checkpoints
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.agent
            .checkpoint_dir
            .clone()
            .unwrap_or_else(|| self.store.data_dir.join("checkpoints"))
    }
}
