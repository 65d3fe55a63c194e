//! Confirmation gate
//!
//! Entering the gate never writes anything. The request shown to the human
//! is rebuilt from the checkpointed state each time, so a replayed
//! suspension presents exactly the same payload.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::state::{ConfirmationResponse, MacroRecord, MacroSource, ProcessingResult, TurnState};

/// What the human is asked to approve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub conversation_id: String,
    pub turn_id: Uuid,
    pub question: String,
    pub record: MacroRecord,
    pub source: MacroSource,
    /// Set when the values are an oracle estimate rather than reference data
    pub warning: bool,
    /// Items queued behind this one
    pub remaining_items: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Approved; the record must go to the persistence writer
    Confirmed(MacroRecord),
    Rejected,
    /// Nothing was in flight
    PassThrough,
}

fn question(record: &MacroRecord) -> String {
    let mut question = format!(
        "Log {} {} of {}: {} kcal, {} g protein, {} g carbs, {} g fat?",
        record.quantity,
        record.unit,
        record.name,
        record.macros.calories,
        record.macros.protein,
        record.macros.carbs,
        record.macros.fat
    );
    if record.source == MacroSource::Estimated {
        question.push_str(" (estimated, not from the nutrition database)");
    }
    question
}

/// Build the confirmation payload for the in-flight record, if any
pub fn build_request(state: &TurnState) -> Option<ConfirmationRequest> {
    let record = state.in_flight.as_ref()?;
    Some(ConfirmationRequest {
        conversation_id: state.conversation_id.clone(),
        turn_id: state.turn_id,
        question: question(record),
        record: record.clone(),
        source: record.source,
        warning: record.source == MacroSource::Estimated,
        remaining_items: state.queue.len().saturating_sub(1),
    })
}

/// Apply the human's decision.
///
/// A rejection is terminal for the head item and is recorded here. An
/// approval leaves the state untouched; the writer advances it only once
/// the entry is durable.
pub fn apply_decision(state: &mut TurnState, response: &ConfirmationResponse) -> GateOutcome {
    let Some(record) = state.in_flight.clone() else {
        return GateOutcome::PassThrough;
    };

    if response.approved {
        info!("Entry for {} confirmed", record.name);
        return GateOutcome::Confirmed(record);
    }

    info!("Entry for {} declined", record.name);
    match state.head().cloned() {
        Some(item) => state.complete_head(ProcessingResult::rejected(&item, &record)),
        None => {
            state.in_flight = None;
            state.awaiting_decision = false;
            state.touch();
        }
    }
    GateOutcome::Rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::{ItemStatus, PendingItem};
    use crate::storage::Macros;

    fn suspended(source: MacroSource) -> TurnState {
        let mut state = TurnState::new(
            "conv-9",
            vec![PendingItem::new("apple", 150.0), PendingItem::new("egg", 50.0)],
            None,
        );
        state.in_flight = Some(MacroRecord {
            record_id: Uuid::new_v4(),
            name: "apple".to_string(),
            quantity: 150.0,
            unit: "g".to_string(),
            macros: Macros::new(78.0, 0.45, 20.7, 0.3),
            source,
            provenance_id: match source {
                MacroSource::Database => Some(6),
                MacroSource::Estimated => None,
            },
            raw_text: "150g apple".to_string(),
            meal_type: None,
        });
        state.awaiting_decision = true;
        state
    }

    #[test]
    fn test_build_request_is_deterministic() {
        let state = suspended(MacroSource::Database);
        let first = build_request(&state).unwrap();
        let second = build_request(&state).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.remaining_items, 1);
        assert!(!first.warning);
    }

    #[test]
    fn test_estimated_record_carries_warning() {
        let request = build_request(&suspended(MacroSource::Estimated)).unwrap();
        assert!(request.warning);
        assert!(request.question.contains("estimated"));
    }

    #[test]
    fn test_no_in_flight_passes_through() {
        let mut state = TurnState::new("conv-9", vec![], None);
        assert!(build_request(&state).is_none());
        assert_eq!(
            apply_decision(&mut state, &ConfirmationResponse::approve()),
            GateOutcome::PassThrough
        );
    }

    #[test]
    fn test_approval_leaves_state_untouched() {
        let mut state = suspended(MacroSource::Database);
        let before = state.clone();
        let outcome = apply_decision(&mut state, &ConfirmationResponse::approve());
        assert!(matches!(outcome, GateOutcome::Confirmed(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_rejection_dequeues_and_records() {
        let mut state = suspended(MacroSource::Database);
        let outcome = apply_decision(&mut state, &ConfirmationResponse::default());

        assert_eq!(outcome, GateOutcome::Rejected);
        assert!(state.in_flight.is_none());
        assert!(!state.awaiting_decision);
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.results[0].status, ItemStatus::Rejected);
    }
}
