//! Reports re-read from the durable store
//!
//! Nothing here is cached: every report reflects what the store returns at
//! the time it is built.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::storage::{EntryQuery, FoodStore, Macros, PersistedEntry, StorageResult};

/// Everything logged on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub entries: Vec<PersistedEntry>,
    pub totals: Macros,
}

/// Totals for a single date or an inclusive date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub query: EntryQuery,
    pub entries: Vec<PersistedEntry>,
    pub totals: Macros,
    pub days: Vec<DayTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTotals {
    pub date: NaiveDate,
    pub count: usize,
    pub totals: Macros,
}

fn sum(entries: &[PersistedEntry]) -> Macros {
    entries
        .iter()
        .fold(Macros::default(), |acc, entry| acc + entry.macros)
}

pub async fn daily_report(store: &dyn FoodStore, date: NaiveDate) -> StorageResult<DailyReport> {
    let entries = store.list_entries(EntryQuery::Day(date)).await?;
    let totals = sum(&entries);
    Ok(DailyReport {
        date,
        entries,
        totals,
    })
}

pub async fn stats(store: &dyn FoodStore, query: EntryQuery) -> StorageResult<StatsReport> {
    let entries = store.list_entries(query).await?;

    let mut by_day: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for entry in &entries {
        let date = entry.consumed_at.date_naive();
        let day = by_day.entry(date).or_insert_with(|| DayTotals {
            date,
            count: 0,
            totals: Macros::default(),
        });
        day.count += 1;
        day.totals = day.totals + entry.macros;
    }

    Ok(StatsReport {
        query,
        totals: sum(&entries),
        days: by_day.into_values().collect(),
        entries,
    })
}
