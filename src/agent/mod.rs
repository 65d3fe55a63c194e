//! The food-logging state machine
//!
//! Items of one utterance are processed strictly in order. Each is resolved
//! against the reference table, turned into a record, and held at the
//! confirmation gate until a human decides. The turn is checkpointed there
//! and may be resumed by another process much later.

pub mod calculator;
pub mod checkpoint;
pub mod controller;
pub mod engine;
pub mod gate;
pub mod interaction;
pub mod lock;
pub mod resolver;
pub mod state;
pub mod writer;

pub use calculator::{Computation, MacroCalculator};
pub use checkpoint::{CheckpointManager, PendingTurn, StoredCheckpoint, CHECKPOINT_VERSION};
pub use controller::Route;
pub use engine::{DiscardedTurn, EngineSettings, TurnEngine, TurnOutcome, TurnSummary};
pub use gate::{ConfirmationRequest, GateOutcome};
pub use interaction::{drive_turn, AutoApprove, ConfirmationHandler, ConsoleConfirmation};
pub use lock::{ConversationLock, ConversationLocks};
pub use resolver::{CandidateResolver, CandidateRoute, Resolution};
pub use state::{
    ConfirmationResponse, ItemStatus, MacroRecord, MacroSource, PendingItem, ProcessingResult,
    TurnState,
};
pub use writer::PersistenceWriter;
