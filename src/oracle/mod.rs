//! External decision sources
//!
//! Both oracles are untrusted: their answers are validated by the caller
//! before they influence what gets logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub mod claude;
pub mod error;
pub mod prompts;

pub use claude::ClaudeOracle;
pub use error::{OracleError, OracleResult};

use crate::config::{OracleConfig, OracleProvider};
use crate::error::Result;
use crate::storage::{Candidate, FoodId};

/// Status reported by the disambiguation oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStatus {
    Selected,
    NoMatch,
    Ambiguous,
    /// Anything else the oracle might say
    #[serde(other)]
    Unknown,
}

/// Raw disambiguation answer, before validation against the offered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionAnswer {
    pub status: SelectionStatus,
    #[serde(default)]
    pub food_id: Option<FoodId>,
    #[serde(default)]
    pub confidence: Option<String>,
}

impl SelectionAnswer {
    pub fn selected(food_id: FoodId) -> Self {
        Self {
            status: SelectionStatus::Selected,
            food_id: Some(food_id),
            confidence: None,
        }
    }

    pub fn no_match() -> Self {
        Self {
            status: SelectionStatus::NoMatch,
            food_id: None,
            confidence: None,
        }
    }
}

/// Chooses one candidate among several database matches
#[async_trait]
pub trait Disambiguator: Send + Sync {
    /// `context` is the user's original wording of the item
    async fn disambiguate(
        &self,
        context: &str,
        candidates: &[Candidate],
    ) -> OracleResult<SelectionAnswer>;
}

/// Estimates nutrition for foods absent from the database
#[async_trait]
pub trait Estimator: Send + Sync {
    /// Expected to return an object with `calories`, `protein`, `carbs` and `fat`
    async fn estimate(&self, name: &str, quantity: f64, unit: &str)
        -> OracleResult<serde_json::Value>;
}

/// Stand-in used when no remote oracle is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

#[async_trait]
impl Disambiguator for OfflineOracle {
    async fn disambiguate(
        &self,
        _context: &str,
        _candidates: &[Candidate],
    ) -> OracleResult<SelectionAnswer> {
        Ok(SelectionAnswer::no_match())
    }
}

#[async_trait]
impl Estimator for OfflineOracle {
    async fn estimate(
        &self,
        name: &str,
        _quantity: f64,
        _unit: &str,
    ) -> OracleResult<serde_json::Value> {
        Err(OracleError::unavailable(format!(
            "no estimation oracle configured for '{}'",
            name
        )))
    }
}

/// The pair of oracles a turn engine consults
#[derive(Clone)]
pub struct Oracles {
    pub disambiguator: Arc<dyn Disambiguator>,
    pub estimator: Arc<dyn Estimator>,
}

impl Oracles {
    pub fn new(disambiguator: Arc<dyn Disambiguator>, estimator: Arc<dyn Estimator>) -> Self {
        Self {
            disambiguator,
            estimator,
        }
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineOracle), Arc::new(OfflineOracle))
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        match config.provider {
            OracleProvider::Claude => {
                info!("Using Claude oracle with model {}", config.model);
                let oracle = Arc::new(ClaudeOracle::new(config)?);
                Ok(Self::new(oracle.clone(), oracle))
            }
            OracleProvider::Offline => {
                info!("No remote oracle configured; running offline");
                Ok(Self::offline())
            }
        }
    }
}
