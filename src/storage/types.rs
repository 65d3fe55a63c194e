//! Types shared by the food store contract and its backends

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key of a reference food row
pub type FoodId = i64;

/// Primary key of a persisted log entry
pub type EntryId = i64;

/// Ceiling on any single nutrient value; sums of many entries stay finite below it
pub const MAX_NUTRIENT_VALUE: f64 = 1e9;

/// Nutrient values: kcal plus grams of each macronutrient
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    /// Apply `f` to every nutrient
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            calories: f(self.calories),
            protein: f(self.protein),
            carbs: f(self.carbs),
            fat: f(self.fat),
        }
    }

    /// True when every nutrient is non-negative and at most [`MAX_NUTRIENT_VALUE`]
    pub fn is_plausible(&self) -> bool {
        [self.calories, self.protein, self.carbs, self.fat]
            .iter()
            .all(|v| (0.0..=MAX_NUTRIENT_VALUE).contains(v))
    }
}

impl std::ops::Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

/// A database row offered as a possible match for a pending item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: FoodId,
    pub name: String,
}

/// Reference nutrition row, normalized per 100 units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFood {
    pub id: FoodId,
    pub name: String,
    pub per_100: Macros,
}

/// Reference row to insert during ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFood {
    pub name: String,
    pub per_100: Macros,
}

/// A log entry about to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    /// Identity of the approved record; a second append with the same key is a no-op
    pub idempotency_key: Uuid,
    pub provenance_id: Option<FoodId>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub macros: Macros,
    pub consumed_at: DateTime<Utc>,
    pub raw_text: String,
    #[serde(default)]
    pub meal_type: Option<String>,
}

/// A durable log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub id: EntryId,
    pub idempotency_key: Uuid,
    pub provenance_id: Option<FoodId>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub macros: Macros,
    pub consumed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub raw_text: String,
    #[serde(default)]
    pub meal_type: Option<String>,
}

impl PersistedEntry {
    pub(crate) fn from_new(id: EntryId, entry: NewEntry) -> Self {
        Self {
            id,
            idempotency_key: entry.idempotency_key,
            provenance_id: entry.provenance_id,
            name: entry.name,
            quantity: entry.quantity,
            unit: entry.unit,
            macros: entry.macros,
            consumed_at: entry.consumed_at,
            created_at: Utc::now(),
            raw_text: entry.raw_text,
            meal_type: entry.meal_type,
        }
    }
}

/// Which entries to list, by the UTC calendar date of `consumed_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntryQuery {
    Day(NaiveDate),
    /// Inclusive on both ends
    Range { start: NaiveDate, end: NaiveDate },
}

impl EntryQuery {
    pub fn matches(&self, consumed_at: &DateTime<Utc>) -> bool {
        let day = consumed_at.date_naive();
        match self {
            Self::Day(d) => day == *d,
            Self::Range { start, end } => day >= *start && day <= *end,
        }
    }
}

/// Case-insensitive substring match used by the lookup of in-process backends
pub(crate) fn name_matches(name: &str, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    !query.is_empty() && name.to_lowercase().contains(&query)
}
