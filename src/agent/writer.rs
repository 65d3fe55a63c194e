//! Write-through persistence of approved records

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::state::{MacroRecord, ProcessingResult, TurnState};
use crate::error::{ErrorCode, FitpalError, Result};
use crate::report;
use crate::storage::{FoodStore, NewEntry};

pub struct PersistenceWriter {
    store: Arc<dyn FoodStore>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn FoodStore>) -> Self {
        Self { store }
    }

    /// Persist an approved record and advance past the head item.
    ///
    /// The state is modified only after the entry is durable and the day's
    /// report has been re-read; on error it is exactly as it was.
    pub async fn persist(&self, state: &mut TurnState, record: MacroRecord) -> Result<()> {
        let item = state.head().cloned().ok_or_else(|| {
            FitpalError::turn(
                ErrorCode::CHECKPOINT_CORRUPTED,
                "approved record has no queued item",
                Some(state.conversation_id.clone()),
            )
        })?;

        let consumed_at = state.consumed_at.unwrap_or_else(Utc::now);
        let entry = NewEntry {
            idempotency_key: record.record_id,
            provenance_id: record.provenance_id,
            name: record.name.clone(),
            quantity: record.quantity,
            unit: record.unit.clone(),
            macros: record.macros,
            consumed_at,
            raw_text: record.raw_text.clone(),
            meal_type: record.meal_type.clone(),
        };

        let entry_id = self.store.append_entry(entry).await?;
        debug!("Entry {} written for record {}", entry_id, record.record_id);

        let daily = report::daily_report(self.store.as_ref(), consumed_at.date_naive()).await?;

        info!("Logged {} ({}kcal)", record.name, record.macros.calories);
        state.daily_report = Some(daily);
        state.complete_head(ProcessingResult::logged(&item, &record));
        Ok(())
    }
}
