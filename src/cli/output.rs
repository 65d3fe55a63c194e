//! Rendering of command results

use anyhow::Result;
use serde::Serialize;

use crate::agent::{ConfirmationRequest, DiscardedTurn, PendingTurn, TurnOutcome, TurnSummary};
use crate::agent::interaction::format_request;
use crate::report::{DailyReport, StatsReport};
use crate::storage::{Candidate, IngestStats, Macros};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_macros(macros: &Macros) -> String {
    format!(
        "{:.1} kcal | protein {:.1} g | carbs {:.1} g | fat {:.1} g",
        macros.calories, macros.protein, macros.carbs, macros.fat
    )
}

pub fn print_request(request: &ConfirmationRequest, json: bool) -> Result<()> {
    if json {
        return print_json(request);
    }
    println!("{}", format_request(request));
    println!(
        "Answer with: fitpal resume --conversation {} --approve|--reject",
        request.conversation_id
    );
    Ok(())
}

fn print_daily(report: &DailyReport) {
    println!(
        "{}: {} entries, {}",
        report.date,
        report.entries.len(),
        format_macros(&report.totals)
    );
}

pub fn print_summary(summary: &TurnSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }
    for result in &summary.processing_results {
        println!("{:?}: {}", result.status, result.message);
    }
    if let Some(report) = &summary.daily_report {
        print_daily(report);
    }
    Ok(())
}

pub fn print_outcome(outcome: &TurnOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        TurnOutcome::AwaitingConfirmation(request) => print_request(request, false),
        TurnOutcome::Completed(summary) => print_summary(summary, false),
    }
}

pub fn print_pending(turns: &[PendingTurn], json: bool) -> Result<()> {
    if json {
        return print_json(&turns);
    }
    if turns.is_empty() {
        println!("No unfinished turns.");
        return Ok(());
    }
    let now = chrono::Utc::now();
    for turn in turns {
        let age = now.signed_duration_since(turn.suspended_since);
        if let Some(reason) = &turn.unreadable {
            println!(
                "{}  unreadable  {} (discard it to start over)",
                turn.conversation_id, reason
            );
            continue;
        }
        let state = if turn.awaiting_decision {
            "awaiting confirmation"
        } else {
            "aborted"
        };
        println!(
            "{}  {}  {} ({} items left, idle {}m)",
            turn.conversation_id,
            state,
            turn.item.as_deref().unwrap_or("-"),
            turn.remaining_items,
            age.num_minutes()
        );
    }
    Ok(())
}

pub fn print_pending_request(
    conversation_id: &str,
    request: Option<&ConfirmationRequest>,
    json: bool,
) -> Result<()> {
    match request {
        Some(request) => print_request(request, json),
        None if json => print_json(&serde_json::Value::Null),
        None => {
            println!("Conversation {} is not waiting for a confirmation.", conversation_id);
            Ok(())
        }
    }
}

pub fn print_discarded(discarded: &DiscardedTurn, json: bool) -> Result<()> {
    if json {
        return print_json(discarded);
    }
    match discarded {
        DiscardedTurn::Turn(state) => println!(
            "Discarded turn {} for {} ({} items not logged)",
            state.turn_id,
            state.conversation_id,
            state.queue.len()
        ),
        DiscardedTurn::Unreadable { conversation_id, .. } => println!(
            "Discarded unreadable checkpoint for {}",
            conversation_id
        ),
    }
    Ok(())
}

pub fn print_stats(report: &StatsReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    for day in &report.days {
        println!(
            "{}: {} entries, {}",
            day.date,
            day.count,
            format_macros(&day.totals)
        );
    }
    println!("Total: {}", format_macros(&report.totals));
    Ok(())
}

pub fn print_candidates(candidates: &[Candidate], json: bool) -> Result<()> {
    if json {
        return print_json(&candidates);
    }
    if candidates.is_empty() {
        println!("No matches.");
    }
    for candidate in candidates {
        println!("{:>6}  {}", candidate.id, candidate.name);
    }
    Ok(())
}

pub fn print_ingest(stats: &IngestStats, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "inserted": stats.inserted,
            "skipped": stats.skipped,
        }));
    }
    println!(
        "Inserted {} reference foods ({} rows skipped)",
        stats.inserted, stats.skipped
    );
    Ok(())
}
