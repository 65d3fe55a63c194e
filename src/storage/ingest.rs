//! Reference data ingestion from a nutrient CSV export
//!
//! Expected headers: `Food, Measure, Grams, Calories, Protein, Fat, Carbs, Category`.
//! Each row describes one serving measure; values are normalized to 100 g.

use serde::Deserialize;
use std::io::Read;
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::traits::FoodStore;
use super::types::{Macros, NewFood};

/// Summary of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct FoodRow {
    #[serde(rename = "Food", default)]
    food: Option<String>,
    #[serde(rename = "Grams", default)]
    grams: Option<String>,
    #[serde(rename = "Calories", default)]
    calories: Option<String>,
    #[serde(rename = "Protein", default)]
    protein: Option<String>,
    #[serde(rename = "Fat", default)]
    fat: Option<String>,
    #[serde(rename = "Carbs", default)]
    carbs: Option<String>,
    #[serde(rename = "Category", default)]
    category: Option<String>,
}

/// Parse a numeric cell. Empty cells and the trace markers `t` / `a` read as 0.
pub fn clean_value(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let value = raw.trim().to_lowercase();
    if value.is_empty() || value == "t" || value == "a" {
        return 0.0;
    }
    value.replace(',', "").parse::<f64>().unwrap_or(0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normalize_row(row: FoodRow) -> Option<NewFood> {
    let name = row.food.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    let grams = clean_value(row.grams.as_deref());
    if grams <= 0.0 {
        debug!("Skipping {} due to 0 grams", name);
        return None;
    }

    let name = match row.category.as_deref().map(str::trim) {
        Some(category) if category.contains("Breads") => format!("{} - {}", category, name),
        _ => name.to_string(),
    };

    let per_serving = Macros::new(
        clean_value(row.calories.as_deref()),
        clean_value(row.protein.as_deref()),
        clean_value(row.carbs.as_deref()),
        clean_value(row.fat.as_deref()),
    );

    Some(NewFood {
        name,
        per_100: per_serving.map(|v| round2(v / grams * 100.0)),
    })
}

/// Read reference rows from CSV and insert them into `store`
pub async fn ingest_csv<R: Read>(reader: R, store: &dyn FoodStore) -> StorageResult<IngestStats> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut stats = IngestStats::default();
    let mut foods = Vec::new();
    for row in csv_reader.deserialize::<FoodRow>() {
        let row = row.map_err(StorageError::serialization)?;
        match normalize_row(row) {
            Some(food) => foods.push(food),
            None => stats.skipped += 1,
        }
    }

    for food in foods {
        store.insert_food(food).await?;
        stats.inserted += 1;
    }

    info!(
        "Ingested {} reference foods ({} rows skipped)",
        stats.inserted, stats.skipped
    );
    Ok(stats)
}
