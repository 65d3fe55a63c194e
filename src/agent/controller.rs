//! Loop control between items

use super::state::TurnState;

/// Next step of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A record is in flight and needs a human decision
    AwaitDecision,
    /// Resolve and compute the queue head
    ProcessHead,
    /// Every item reached a terminal outcome
    Finish,
}

pub fn route(state: &TurnState) -> Route {
    if state.in_flight.is_some() {
        Route::AwaitDecision
    } else if state.queue.is_empty() {
        Route::Finish
    } else {
        Route::ProcessHead
    }
}
