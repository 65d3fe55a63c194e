//! Turn engine: drives items through resolution, calculation, the
//! confirmation gate and persistence, suspending at the gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::calculator::{Computation, MacroCalculator};
use super::checkpoint::{validate_conversation_id, CheckpointManager, PendingTurn};
use super::controller::{route, Route};
use super::gate::{apply_decision, build_request, ConfirmationRequest, GateOutcome};
use super::lock::{ConversationLock, ConversationLocks};
use super::resolver::CandidateResolver;
use super::state::{ConfirmationResponse, PendingItem, ProcessingResult, TurnState};
use super::writer::PersistenceWriter;
use crate::config::Config;
use crate::error::{ErrorCode, FitpalError, Result};
use crate::oracle::Oracles;
use crate::report::DailyReport;
use crate::storage::FoodStore;

/// Everything the downstream reply step needs once a turn completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub conversation_id: String,
    pub turn_id: Uuid,
    pub processing_results: Vec<ProcessingResult>,
    pub daily_report: Option<DailyReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "payload", rename_all = "snake_case")]
pub enum TurnOutcome {
    AwaitingConfirmation(ConfirmationRequest),
    Completed(TurnSummary),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// What `discard` removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscardedTurn {
    Turn(TurnState),
    /// A checkpoint that could not be parsed, deleted without being read
    Unreadable {
        conversation_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lookup_limit: usize,
    pub precision: u32,
    pub oracle_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookup_limit: 10,
            precision: 2,
            oracle_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookup_limit: config.store.lookup_limit,
            precision: config.agent.precision,
            oracle_timeout: config.oracle.timeout,
        }
    }
}

pub struct TurnEngine {
    resolver: CandidateResolver,
    calculator: MacroCalculator,
    writer: PersistenceWriter,
    checkpoints: CheckpointManager,
    locks: ConversationLocks,
}

impl TurnEngine {
    pub fn new(
        store: Arc<dyn FoodStore>,
        oracles: Oracles,
        checkpoint_dir: PathBuf,
        settings: EngineSettings,
    ) -> Self {
        Self {
            resolver: CandidateResolver::new(
                store.clone(),
                oracles.disambiguator,
                settings.lookup_limit,
                settings.oracle_timeout,
            ),
            calculator: MacroCalculator::new(
                store.clone(),
                oracles.estimator,
                settings.precision,
                settings.oracle_timeout,
            ),
            writer: PersistenceWriter::new(store),
            locks: ConversationLocks::new(&checkpoint_dir),
            checkpoints: CheckpointManager::new(checkpoint_dir),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn FoodStore>, oracles: Oracles) -> Self {
        Self::new(
            store,
            oracles,
            config.checkpoint_dir(),
            EngineSettings::from_config(config),
        )
    }

    /// Start a turn for the items of one utterance.
    ///
    /// Refused while the conversation has an unfinished turn.
    pub async fn start_turn(
        &self,
        conversation_id: &str,
        items: Vec<PendingItem>,
        consumed_at: Option<DateTime<Utc>>,
    ) -> Result<TurnOutcome> {
        validate_conversation_id(conversation_id)?;
        validate_items(&items)?;
        let _lock = self.acquire(conversation_id).await?;

        if self.checkpoints.exists(conversation_id).await? {
            return Err(FitpalError::turn(
                ErrorCode::TURN_IN_PROGRESS,
                "an earlier turn is still unfinished; resume, continue or discard it first",
                Some(conversation_id.to_string()),
            ));
        }

        let state = TurnState::new(conversation_id, items, consumed_at);
        info!(
            "Starting turn {} for conversation {} with {} items",
            state.turn_id,
            conversation_id,
            state.queue.len()
        );
        self.advance(state).await
    }

    /// Resume a suspended turn with the human's decision
    pub async fn resume(
        &self,
        conversation_id: &str,
        response: ConfirmationResponse,
    ) -> Result<TurnOutcome> {
        validate_conversation_id(conversation_id)?;
        let _lock = self.acquire(conversation_id).await?;

        let mut state = self.load_existing(conversation_id).await?;
        if !state.awaiting_decision {
            return Err(FitpalError::turn(
                ErrorCode::TURN_NOT_AWAITING,
                "turn is not waiting for a confirmation; use continue instead",
                Some(conversation_id.to_string()),
            ));
        }

        match apply_decision(&mut state, &response) {
            GateOutcome::Confirmed(record) => {
                // On failure the checkpoint on disk still awaits this decision
                if let Err(e) = self.writer.persist(&mut state, record).await {
                    error!(
                        "Persisting entry for conversation {} failed: {}",
                        conversation_id, e
                    );
                    return Err(e);
                }
            }
            GateOutcome::Rejected => {}
            GateOutcome::PassThrough => {
                debug!("Nothing in flight for conversation {}", conversation_id);
            }
        }

        self.advance(state).await
    }

    /// Re-enter an unfinished turn.
    ///
    /// A turn aborted before its head item was computed is processed from
    /// that item on; a turn waiting at the gate presents the same request again.
    pub async fn continue_turn(&self, conversation_id: &str) -> Result<TurnOutcome> {
        validate_conversation_id(conversation_id)?;
        let _lock = self.acquire(conversation_id).await?;

        let state = self.load_existing(conversation_id).await?;
        info!(
            "Continuing turn {} for conversation {}",
            state.turn_id, conversation_id
        );
        self.advance(state).await
    }

    /// The confirmation request of a suspended turn, rebuilt from its checkpoint
    pub async fn pending_request(&self, conversation_id: &str) -> Result<Option<ConfirmationRequest>> {
        Ok(self
            .checkpoints
            .load(conversation_id)
            .await?
            .filter(|state| state.awaiting_decision)
            .and_then(|state| build_request(&state)))
    }

    /// Drop an unfinished turn without recording a decision.
    ///
    /// A checkpoint too corrupted to parse is deleted as well; one written by
    /// a newer version is left for that version to finish.
    pub async fn discard(&self, conversation_id: &str) -> Result<DiscardedTurn> {
        validate_conversation_id(conversation_id)?;
        let _lock = self.acquire(conversation_id).await?;

        let state = match self.load_existing(conversation_id).await {
            Ok(state) => state,
            Err(e) if e.code() == ErrorCode::CHECKPOINT_CORRUPTED => {
                self.checkpoints.delete(conversation_id).await?;
                warn!(
                    "Discarded unreadable checkpoint for conversation {} (no decision recorded): {}",
                    conversation_id, e
                );
                return Ok(DiscardedTurn::Unreadable {
                    conversation_id: conversation_id.to_string(),
                    reason: e.user_message(),
                });
            }
            Err(e) => return Err(e),
        };

        self.checkpoints.delete(conversation_id).await?;
        warn!(
            "Discarded turn {} for conversation {} with {} unprocessed items (no decision recorded)",
            state.turn_id,
            conversation_id,
            state.queue.len()
        );
        Ok(DiscardedTurn::Turn(state))
    }

    /// Unfinished turns, oldest first
    pub async fn pending(&self) -> Result<Vec<PendingTurn>> {
        let stored = self.checkpoints.list().await?;
        Ok(stored.iter().map(PendingTurn::from).collect())
    }

    async fn advance(&self, mut state: TurnState) -> Result<TurnOutcome> {
        loop {
            match route(&state) {
                Route::AwaitDecision => {
                    state.awaiting_decision = true;
                    state.touch();
                    self.checkpoints.save(&state).await?;

                    let request = build_request(&state).ok_or_else(|| {
                        FitpalError::turn(
                            ErrorCode::TURN_GENERIC,
                            "suspended without a record in flight",
                            Some(state.conversation_id.clone()),
                        )
                    })?;
                    info!(
                        "Turn {} waiting for confirmation of {}",
                        state.turn_id, request.record.name
                    );
                    return Ok(TurnOutcome::AwaitingConfirmation(request));
                }
                Route::Finish => {
                    self.checkpoints.delete(&state.conversation_id).await?;
                    info!(
                        "Turn {} finished with {} results",
                        state.turn_id,
                        state.results.len()
                    );
                    return Ok(TurnOutcome::Completed(TurnSummary {
                        conversation_id: state.conversation_id,
                        turn_id: state.turn_id,
                        processing_results: state.results,
                        daily_report: state.daily_report,
                    }));
                }
                Route::ProcessHead => {
                    if let Err(e) = self.process_head(&mut state).await {
                        self.checkpoint_aborted(&mut state).await;
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn process_head(&self, state: &mut TurnState) -> Result<()> {
        let Some(item) = state.head().cloned() else {
            return Ok(());
        };

        let resolution = self.resolver.resolve(&item).await?;
        debug!("Resolved '{}' as {:?}", item.name, resolution);

        match self.calculator.compute(&item, &resolution).await? {
            Computation::Record(record) => {
                state.in_flight = Some(record);
                state.touch();
            }
            Computation::Failed(message) => {
                info!("Item '{}' failed: {}", item.name, message);
                state.complete_head(ProcessingResult::failed(&item, message));
            }
        }
        Ok(())
    }

    /// Keep an aborted turn so it can be continued
    async fn checkpoint_aborted(&self, state: &mut TurnState) {
        state.awaiting_decision = false;
        state.touch();
        match self.checkpoints.save(state).await {
            Ok(()) => warn!(
                "Turn {} for conversation {} aborted; continue it once the cause is fixed",
                state.turn_id, state.conversation_id
            ),
            Err(e) => error!(
                "Could not checkpoint aborted turn {}: {}",
                state.turn_id, e
            ),
        }
    }

    async fn load_existing(&self, conversation_id: &str) -> Result<TurnState> {
        self.checkpoints.load(conversation_id).await?.ok_or_else(|| {
            FitpalError::turn(
                ErrorCode::TURN_NOT_FOUND,
                "no unfinished turn",
                Some(conversation_id.to_string()),
            )
        })
    }

    async fn acquire(&self, conversation_id: &str) -> Result<ConversationLock> {
        self.locks.acquire(conversation_id).await
    }
}

/// A queued quantity must survive the checkpoint. Zero and negative ones
/// are JSON-safe and fail their item in the calculator instead.
fn validate_items(items: &[PendingItem]) -> Result<()> {
    match items.iter().find(|item| !item.quantity.is_finite()) {
        Some(item) => Err(FitpalError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_INPUT,
            format!(
                "quantity of '{}' must be a finite number, got {}",
                item.name, item.quantity
            ),
            Some("quantity".to_string()),
        )),
        None => Ok(()),
    }
}
