//! Human side of the confirmation gate

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use super::engine::{TurnEngine, TurnOutcome, TurnSummary};
use super::gate::ConfirmationRequest;
use super::state::ConfirmationResponse;
use crate::error::Result;

/// Answers confirmation requests
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse>;
}

/// Render a request for a terminal
pub fn format_request(request: &ConfirmationRequest) -> String {
    let mut output = String::new();
    if request.warning {
        output.push_str("WARNING: these values are an estimate, not reference data.\n");
    }
    output.push_str(&request.question);
    if request.remaining_items > 0 {
        output.push_str(&format!(" ({} more after this)", request.remaining_items));
    }
    output
}

/// Only an explicit yes approves
pub fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Prompts on stdout and reads the answer from stdin
#[derive(Debug, Default)]
pub struct ConsoleConfirmation;

impl ConsoleConfirmation {
    pub fn new() -> Self {
        Self
    }

    fn read_line() -> io::Result<String> {
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(input)
    }
}

#[async_trait]
impl ConfirmationHandler for ConsoleConfirmation {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        print!("{} [y/N]: ", format_request(request));
        io::stdout().flush()?;

        let input = Self::read_line()?;
        Ok(ConfirmationResponse {
            approved: parse_answer(&input),
        })
    }
}

/// Approves every request; used for `--yes`
#[derive(Debug, Default)]
pub struct AutoApprove;

#[async_trait]
impl ConfirmationHandler for AutoApprove {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        tracing::info!("Auto-approving {}", request.record.name);
        Ok(ConfirmationResponse::approve())
    }
}

/// Resume `outcome` with answers from `handler` until the turn completes.
///
/// Confirmations are asked strictly one at a time.
pub async fn drive_turn(
    engine: &TurnEngine,
    handler: &dyn ConfirmationHandler,
    mut outcome: TurnOutcome,
) -> Result<TurnSummary> {
    loop {
        match outcome {
            TurnOutcome::Completed(summary) => return Ok(summary),
            TurnOutcome::AwaitingConfirmation(request) => {
                let response = handler.confirm(&request).await?;
                outcome = engine.resume(&request.conversation_id, response).await?;
            }
        }
    }
}
