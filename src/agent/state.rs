//! Turn state and the records that flow through it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::checkpoint::CHECKPOINT_VERSION;
use crate::report::DailyReport;
use crate::storage::{FoodId, Macros};

fn default_unit() -> String {
    "g".to_string()
}

/// One food item extracted upstream from the user's utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    pub name: String,
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// The user's own wording for this item
    #[serde(default)]
    pub raw_text: String,
    /// Meal the item was eaten at, e.g. "breakfast"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
}

impl PendingItem {
    pub fn new(name: impl Into<String>, quantity: f64) -> Self {
        let name = name.into();
        Self {
            raw_text: format!("{}g {}", quantity, name),
            name,
            quantity,
            unit: default_unit(),
            meal_type: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = raw_text.into();
        self
    }

    pub fn with_meal_type(mut self, meal_type: impl Into<String>) -> Self {
        self.meal_type = Some(meal_type.into());
        self
    }

    /// Context handed to the disambiguation oracle
    pub fn context(&self) -> &str {
        if self.raw_text.trim().is_empty() {
            &self.name
        } else {
            &self.raw_text
        }
    }
}

/// Where a record's nutrient values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroSource {
    /// Scaled from a reference row
    Database,
    /// Produced by the estimation oracle
    Estimated,
}

impl std::fmt::Display for MacroSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Estimated => write!(f, "estimated"),
        }
    }
}

/// The computed record awaiting a human decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    /// Minted once per computation; doubles as the write's idempotency key
    pub record_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(flatten)]
    pub macros: Macros,
    pub source: MacroSource,
    /// Reference row id; always `None` for estimated records
    pub provenance_id: Option<FoodId>,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Logged,
    Failed,
    Rejected,
}

/// Terminal outcome of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub raw_text: String,
    pub status: ItemStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MacroSource>,
}

impl ProcessingResult {
    fn from_item(item: &PendingItem, status: ItemStatus, message: String) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            raw_text: item.raw_text.clone(),
            status,
            message,
            source: None,
        }
    }

    pub fn logged(item: &PendingItem, record: &MacroRecord) -> Self {
        let mut result = Self::from_item(
            item,
            ItemStatus::Logged,
            format!("Logged {} ({}kcal)", item.name, record.macros.calories),
        );
        result.source = Some(record.source);
        result
    }

    pub fn failed(item: &PendingItem, message: impl Into<String>) -> Self {
        Self::from_item(item, ItemStatus::Failed, message.into())
    }

    pub fn rejected(item: &PendingItem, record: &MacroRecord) -> Self {
        let mut result = Self::from_item(
            item,
            ItemStatus::Rejected,
            format!("Not logged {} (declined)", item.name),
        );
        result.source = Some(record.source);
        result
    }
}

/// The human's answer at the confirmation gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    /// Absent means declined
    #[serde(default)]
    pub approved: bool,
}

impl ConfirmationResponse {
    pub fn approve() -> Self {
        Self { approved: true }
    }

    pub fn reject() -> Self {
        Self { approved: false }
    }
}

/// Checkpointed continuation of one turn.
///
/// The queue head is the item being processed; it leaves the queue only
/// once its outcome is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub version: u32,
    pub turn_id: Uuid,
    pub conversation_id: String,
    pub queue: VecDeque<PendingItem>,
    pub in_flight: Option<MacroRecord>,
    pub results: Vec<ProcessingResult>,
    pub awaiting_decision: bool,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub daily_report: Option<DailyReport>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TurnState {
    pub fn new(
        conversation_id: impl Into<String>,
        items: Vec<PendingItem>,
        consumed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            turn_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            queue: items.into(),
            in_flight: None,
            results: Vec::new(),
            awaiting_decision: false,
            consumed_at,
            daily_report: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn head(&self) -> Option<&PendingItem> {
        self.queue.front()
    }

    /// Record the head's terminal outcome and move on to the next item
    pub fn complete_head(&mut self, result: ProcessingResult) {
        self.queue.pop_front();
        self.in_flight = None;
        self.awaiting_decision = false;
        self.results.push(result);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// First number that JSON cannot carry, named by where it sits.
    ///
    /// serde_json writes NaN and infinities as `null`, which would make the
    /// checkpoint unreadable on the next load.
    pub fn non_finite_field(&self) -> Option<String> {
        let macros_ok = |m: &Macros| {
            [m.calories, m.protein, m.carbs, m.fat]
                .iter()
                .all(|v| v.is_finite())
        };

        if let Some(i) = self.queue.iter().position(|item| !item.quantity.is_finite()) {
            return Some(format!("queue[{}].quantity", i));
        }
        if let Some(record) = &self.in_flight {
            if !record.quantity.is_finite() {
                return Some("in_flight.quantity".to_string());
            }
            if !macros_ok(&record.macros) {
                return Some("in_flight.macros".to_string());
            }
        }
        if let Some(i) = self.results.iter().position(|r| !r.quantity.is_finite()) {
            return Some(format!("results[{}].quantity", i));
        }
        match &self.daily_report {
            Some(report) if !macros_ok(&report.totals) => Some("daily_report.totals".to_string()),
            _ => None,
        }
    }
}
