//! Command routing and execution

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::args::{Commands, DecisionMode};
use super::input::{parse_consumed_at, parse_date, parse_item_spec, TurnInput};
use super::output;
use crate::agent::{
    drive_turn, AutoApprove, ConfirmationHandler, ConfirmationResponse, ConsoleConfirmation,
    TurnEngine, TurnOutcome,
};
use crate::config::Config;
use crate::error::{ErrorCode, FitpalError};
use crate::oracle::Oracles;
use crate::report;
use crate::storage::{ingest_csv, EntryQuery, FoodStore, StorageFactory};

/// Execute a CLI command against the configured store
pub async fn execute_command(command: Commands, config: Config, json: bool) -> Result<()> {
    let store = StorageFactory::from_config(&config.store).await?;
    debug!("Opened {:?} store", config.store.backend);

    match command {
        Commands::Log {
            conversation,
            items,
            file,
            consumed_at,
            meal_type,
            mode,
        } => {
            let (mut pending, mut when) = match file {
                Some(path) => {
                    let input = TurnInput::from_path(&path)?;
                    let when = input.consumed_at;
                    (input.into_items(), when)
                }
                None => (Vec::new(), None),
            };
            for spec in &items {
                pending.push(parse_item_spec(spec)?);
            }
            if let Some(meal) = meal_type.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
                for item in &mut pending {
                    item.meal_type = Some(meal.to_lowercase());
                }
            }
            if let Some(value) = consumed_at {
                when = Some(parse_consumed_at(&value)?);
            }
            if pending.is_empty() {
                return Err(FitpalError::validation_with_code(
                    ErrorCode::VALIDATION_EMPTY_TURN,
                    "nothing to log; pass --item or --file",
                    Some("item".to_string()),
                )
                .into());
            }

            let engine = build_engine(&config, store)?;
            let outcome = engine.start_turn(&conversation, pending, when).await?;
            finish_turn(&engine, outcome, &mode, json).await
        }
        Commands::Resume {
            conversation,
            approve,
            reject: _,
            mode,
        } => {
            let engine = build_engine(&config, store)?;
            let outcome = engine
                .resume(&conversation, ConfirmationResponse { approved: approve })
                .await?;
            finish_turn(&engine, outcome, &mode, json).await
        }
        Commands::Continue { conversation, mode } => {
            let engine = build_engine(&config, store)?;
            let outcome = engine.continue_turn(&conversation).await?;
            finish_turn(&engine, outcome, &mode, json).await
        }
        Commands::Pending { conversation: None } => {
            let engine = build_engine(&config, store)?;
            let turns = engine.pending().await?;
            output::print_pending(&turns, json)
        }
        Commands::Pending {
            conversation: Some(conversation),
        } => {
            let engine = build_engine(&config, store)?;
            let request = engine.pending_request(&conversation).await?;
            output::print_pending_request(&conversation, request.as_ref(), json)
        }
        Commands::Discard { conversation } => {
            let engine = build_engine(&config, store)?;
            let discarded = engine.discard(&conversation).await?;
            output::print_discarded(&discarded, json)
        }
        Commands::Stats { date, from, to } => {
            let query = match (date, from, to) {
                (_, Some(from), Some(to)) => {
                    let start = parse_date(&from)?;
                    let end = parse_date(&to)?;
                    if end < start {
                        return Err(FitpalError::validation_with_code(
                            ErrorCode::VALIDATION_INVALID_INPUT,
                            format!("range end {} is before its start {}", end, start),
                            Some("to".to_string()),
                        )
                        .into());
                    }
                    EntryQuery::Range { start, end }
                }
                (Some(date), _, _) => EntryQuery::Day(parse_date(&date)?),
                _ => EntryQuery::Day(Utc::now().date_naive()),
            };
            let stats = report::stats(store.as_ref(), query).await?;
            output::print_stats(&stats, json)
        }
        Commands::Search { query, limit } => {
            let limit = limit.unwrap_or(config.store.lookup_limit);
            let candidates = store.lookup(&query, limit).await?;
            output::print_candidates(&candidates, json)
        }
        Commands::Ingest { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("Failed to open {}", csv.display()))?;
            let stats = ingest_csv(file, store.as_ref()).await?;
            output::print_ingest(&stats, json)
        }
    }
}

fn build_engine(config: &Config, store: Arc<dyn FoodStore>) -> Result<TurnEngine> {
    let oracles = Oracles::from_config(&config.oracle)?;
    Ok(TurnEngine::from_config(config, store, oracles))
}

async fn finish_turn(
    engine: &TurnEngine,
    outcome: TurnOutcome,
    mode: &DecisionMode,
    json: bool,
) -> Result<()> {
    if mode.detach || outcome.is_completed() {
        return output::print_outcome(&outcome, json);
    }

    let handler: Box<dyn ConfirmationHandler> = if mode.auto_approve {
        Box::new(AutoApprove)
    } else {
        Box::new(ConsoleConfirmation::new())
    };
    let summary = drive_turn(engine, handler.as_ref(), outcome).await?;
    output::print_summary(&summary, json)
}
