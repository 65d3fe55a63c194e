//! Macro calculation by reference scaling or oracle estimation

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::resolver::Resolution;
use super::state::{MacroRecord, MacroSource, PendingItem};
use crate::error::Result;
use crate::oracle::{Estimator, OracleError};
use crate::storage::{FoodId, FoodStore, Macros};

/// Outcome of a calculation
#[derive(Debug, Clone, PartialEq)]
pub enum Computation {
    Record(MacroRecord),
    /// Terminal for the item; never reaches the confirmation gate
    Failed(String),
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Scale per-100-unit reference values to `quantity`
pub fn scale(per_100: Macros, quantity: f64, precision: u32) -> Macros {
    per_100.map(|v| round_to(v * quantity / 100.0, precision))
}

/// Parse an estimation answer into macros.
///
/// Every nutrient must be present as a finite, non-negative JSON number;
/// numeric strings are refused.
pub fn parse_estimate(value: &serde_json::Value) -> std::result::Result<Macros, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("estimate is not an object: {}", value))?;

    let field = |key: &str| -> std::result::Result<f64, String> {
        let number = object
            .get(key)
            .ok_or_else(|| format!("estimate is missing '{}'", key))?
            .as_f64()
            .ok_or_else(|| format!("estimate field '{}' is not a number", key))?;
        if !number.is_finite() || number < 0.0 {
            return Err(format!("estimate field '{}' is out of range: {}", key, number));
        }
        Ok(number)
    };

    Ok(Macros::new(
        field("calories")?,
        field("protein")?,
        field("carbs")?,
        field("fat")?,
    ))
}

pub struct MacroCalculator {
    store: Arc<dyn FoodStore>,
    estimator: Arc<dyn Estimator>,
    precision: u32,
    timeout: Duration,
}

impl MacroCalculator {
    pub fn new(
        store: Arc<dyn FoodStore>,
        estimator: Arc<dyn Estimator>,
        precision: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            estimator,
            precision,
            timeout,
        }
    }

    /// Compute the record for `item`.
    ///
    /// Errors are reserved for store read failures and for transport
    /// failures of the estimation oracle; anything wrong with the data
    /// itself yields [`Computation::Failed`].
    pub async fn compute(&self, item: &PendingItem, resolution: &Resolution) -> Result<Computation> {
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Ok(Computation::Failed(format!(
                "Invalid quantity {} for {}",
                item.quantity, item.name
            )));
        }

        match resolution.food_id() {
            Some(id) => self.from_reference(item, id).await,
            None => self.from_estimate(item).await,
        }
    }

    async fn from_reference(&self, item: &PendingItem, id: FoodId) -> Result<Computation> {
        let Some(reference) = self.store.get_reference(id).await? else {
            warn!("Reference food {} disappeared before calculation", id);
            return Ok(Computation::Failed(format!(
                "No nutrition data for {}",
                item.name
            )));
        };

        if !reference.per_100.is_plausible() {
            return Ok(Computation::Failed(format!(
                "Reference data for {} is invalid",
                reference.name
            )));
        }

        let macros = scale(reference.per_100, item.quantity, self.precision);
        if !macros.is_plausible() {
            warn!(
                "Scaling {} to {} {} left the plausible range",
                reference.name, item.quantity, item.unit
            );
            return Ok(Computation::Failed(format!(
                "Quantity {} is out of range for {}",
                item.quantity, item.name
            )));
        }
        debug!(
            "Scaled reference {} ({}) to {} {}",
            id, reference.name, item.quantity, item.unit
        );
        Ok(Computation::Record(self.record(
            item,
            macros,
            MacroSource::Database,
            Some(id),
        )))
    }

    async fn from_estimate(&self, item: &PendingItem) -> Result<Computation> {
        let call = self
            .estimator
            .estimate(&item.name, item.quantity, &item.unit);
        let answer = match tokio::time::timeout(self.timeout, call).await {
            Ok(answer) => answer,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };

        let value = match answer {
            Ok(value) => value,
            Err(e) if e.is_transport() => return Err(e.into()),
            Err(e) => {
                info!("Estimation for '{}' failed: {}", item.name, e);
                return Ok(Computation::Failed(format!(
                    "Could not estimate {}: {}",
                    item.name, e
                )));
            }
        };

        match parse_estimate(&value) {
            Ok(macros) => {
                let macros = macros.map(|v| round_to(v, self.precision));
                if !macros.is_plausible() {
                    warn!("Rejected estimate for '{}': out of range {:?}", item.name, macros);
                    return Ok(Computation::Failed(format!(
                        "Could not estimate {}: values out of range",
                        item.name
                    )));
                }
                Ok(Computation::Record(self.record(
                    item,
                    macros,
                    MacroSource::Estimated,
                    None,
                )))
            }
            Err(reason) => {
                warn!("Rejected estimate for '{}': {}", item.name, reason);
                Ok(Computation::Failed(format!(
                    "Could not estimate {}: {}",
                    item.name, reason
                )))
            }
        }
    }

    fn record(
        &self,
        item: &PendingItem,
        macros: Macros,
        source: MacroSource,
        provenance_id: Option<FoodId>,
    ) -> MacroRecord {
        MacroRecord {
            record_id: Uuid::new_v4(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            macros,
            source,
            provenance_id,
            raw_text: item.raw_text.clone(),
            meal_type: item.meal_type.clone(),
        }
    }
}
