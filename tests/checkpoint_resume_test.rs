//! Suspend/resume behavior across checkpoint reloads
//!
//! These tests verify that:
//! 1. The confirmation payload is identical after reloading a checkpoint
//! 2. A replayed approval never writes a second entry
//! 3. A failed write leaves the turn waiting for the same decision
//! 4. Turns of one conversation are serialized, also across engines
//! 5. Numbers JSON cannot carry never reach a checkpoint

use anyhow::Result;
use fitpal::agent::{ConfirmationResponse, DiscardedTurn, ItemStatus, PendingItem, TurnOutcome};
use fitpal::error::ErrorCode;
use fitpal::oracle::{Oracles, SelectionAnswer};
use fitpal::storage::{FoodStore, MemoryBackend};
use fitpal::testing::{
    reference_foods, seeded_store, test_engine, FailingStore, ScriptedDisambiguator,
    ScriptedEstimator,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn checkpoint_file(temp_dir: &TempDir, conversation: &str) -> std::path::PathBuf {
    temp_dir
        .path()
        .join("checkpoints")
        .join(format!("{}.checkpoint.json", conversation))
}

#[tokio::test]
async fn test_payload_survives_process_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = seeded_store();

    let first = test_engine(&temp_dir, store.clone(), Oracles::offline());
    let TurnOutcome::AwaitingConfirmation(original) = first
        .start_turn("restart", vec![PendingItem::new("banana", 120.0)], None)
        .await?
    else {
        panic!("expected a confirmation request");
    };
    drop(first);

    // A fresh engine sees only what was checkpointed
    let second = test_engine(&temp_dir, store.clone(), Oracles::offline());
    let reloaded = second.pending_request("restart").await?.expect("pending request");
    assert_eq!(reloaded, original);

    let TurnOutcome::AwaitingConfirmation(replayed) = second.continue_turn("restart").await?
    else {
        panic!("expected the same request again");
    };
    assert_eq!(replayed, original);
    assert_eq!(replayed.record.record_id, original.record.record_id);

    let outcome = second
        .resume("restart", ConfirmationResponse::approve())
        .await?;
    assert!(outcome.is_completed());
    assert_eq!(store.entry_count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_replayed_approval_writes_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = seeded_store();
    let engine = test_engine(&temp_dir, store.clone(), Oracles::offline());

    engine
        .start_turn("replay", vec![PendingItem::new("rice", 200.0)], None)
        .await?;
    let snapshot = std::fs::read_to_string(checkpoint_file(&temp_dir, "replay"))?;

    engine
        .resume("replay", ConfirmationResponse::approve())
        .await?;
    assert_eq!(store.entry_count().await?, 1);

    // Crash between the write and the checkpoint update: the old checkpoint comes back
    std::fs::write(checkpoint_file(&temp_dir, "replay"), snapshot)?;
    let TurnOutcome::Completed(summary) = engine
        .resume("replay", ConfirmationResponse::approve())
        .await?
    else {
        panic!("expected completion");
    };

    assert_eq!(store.entry_count().await?, 1);
    assert_eq!(summary.processing_results[0].status, ItemStatus::Logged);
    Ok(())
}

#[tokio::test]
async fn test_failed_write_keeps_turn_awaiting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(FailingStore::new(MemoryBackend::with_foods(reference_foods())));
    let engine = test_engine(&temp_dir, store.clone(), Oracles::offline());

    let TurnOutcome::AwaitingConfirmation(request) = engine
        .start_turn(
            "flaky",
            vec![PendingItem::new("egg", 50.0), PendingItem::new("apple", 100.0)],
            None,
        )
        .await?
    else {
        panic!("expected a confirmation request");
    };

    let err = engine
        .resume("flaky", ConfirmationResponse::approve())
        .await
        .unwrap_err();
    assert!(err.is_persistence_failure());
    assert_eq!(err.code(), ErrorCode::STORAGE_WRITE_NOT_COMMITTED);
    assert_eq!(store.entry_count().await?, 0);

    let pending = engine.pending().await?;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].awaiting_decision);
    assert_eq!(pending[0].remaining_items, 2);
    assert_eq!(
        engine.pending_request("flaky").await?.expect("still pending"),
        request
    );

    store.set_failing(false);
    let TurnOutcome::AwaitingConfirmation(next) = engine
        .resume("flaky", ConfirmationResponse::approve())
        .await?
    else {
        panic!("expected the second item");
    };
    assert_eq!(next.record.name, "apple");
    assert_eq!(store.entry_count().await?, 1);
    Ok(())
}

fn slow_oracles(delay: Duration) -> Oracles {
    let disambiguator = ScriptedDisambiguator::new(vec![Ok(SelectionAnswer::selected(1))])
        .with_delay(delay);
    Oracles::new(
        Arc::new(disambiguator),
        Arc::new(ScriptedEstimator::new(vec![])),
    )
}

#[tokio::test]
async fn test_conversation_is_serialized() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = test_engine(
        &temp_dir,
        seeded_store(),
        slow_oracles(Duration::from_millis(200)),
    );

    let (first, second) = tokio::join!(
        engine.start_turn("busy", vec![PendingItem::new("chicken", 100.0)], None),
        engine.start_turn("busy", vec![PendingItem::new("banana", 100.0)], None),
    );

    // Whichever call wins, the other is refused
    let (won, lost) = match (first, second) {
        (Ok(outcome), Err(e)) | (Err(e), Ok(outcome)) => (outcome, e),
        other => panic!("expected exactly one turn to start, got {:?}", other),
    };
    assert!(matches!(won, TurnOutcome::AwaitingConfirmation(_)));
    assert_eq!(lost.code(), ErrorCode::TURN_IN_PROGRESS);
    assert_eq!(engine.pending().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_second_engine_on_same_checkpoints_is_refused() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = seeded_store();
    let slow = test_engine(&temp_dir, store.clone(), slow_oracles(Duration::from_millis(500)));
    let other = test_engine(&temp_dir, store.clone(), Oracles::offline());

    let (first, second) = tokio::join!(
        slow.start_turn("shared", vec![PendingItem::new("chicken", 100.0)], None),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            other
                .start_turn("shared", vec![PendingItem::new("banana", 100.0)], None)
                .await
        },
    );

    let TurnOutcome::AwaitingConfirmation(request) = first? else {
        panic!("expected a confirmation request");
    };
    assert_eq!(second.unwrap_err().code(), ErrorCode::TURN_IN_PROGRESS);

    // Once released, the other engine can finish the turn
    let outcome = other
        .resume("shared", ConfirmationResponse::approve())
        .await?;
    assert!(outcome.is_completed());
    assert_eq!(store.entry_count().await?, 1);
    assert_eq!(request.record.name, "chicken");
    Ok(())
}

#[tokio::test]
async fn test_non_finite_values_never_strand_a_conversation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = seeded_store();
    let estimator = ScriptedEstimator::new(vec![Ok(serde_json::json!({
        "calories": 1e307, "protein": 1.0, "carbs": 1.0, "fat": 1.0
    }))]);
    let engine = test_engine(
        &temp_dir,
        store.clone(),
        Oracles::new(
            Arc::new(ScriptedDisambiguator::new(vec![])),
            Arc::new(estimator),
        ),
    );

    let err = engine
        .start_turn("numbers", vec![PendingItem::new("rice", f64::NAN)], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_INPUT);
    assert!(!checkpoint_file(&temp_dir, "numbers").exists());

    // An overflowing estimate fails its item; the turn still finishes
    let TurnOutcome::Completed(summary) = engine
        .start_turn(
            "numbers",
            vec![
                PendingItem::new("lasagna", 300.0),
                PendingItem::new("banana", 1e307),
            ],
            None,
        )
        .await?
    else {
        panic!("expected completion");
    };
    assert!(summary
        .processing_results
        .iter()
        .all(|r| r.status == ItemStatus::Failed));
    assert!(engine.pending().await?.is_empty());

    // The conversation takes new turns afterwards
    let outcome = engine
        .start_turn("numbers", vec![PendingItem::new("banana", 120.0)], None)
        .await?;
    assert!(!outcome.is_completed());
    Ok(())
}

#[tokio::test]
async fn test_corrupted_checkpoint_can_be_discarded() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = test_engine(&temp_dir, seeded_store(), Oracles::offline());
    engine
        .start_turn("broken", vec![PendingItem::new("banana", 120.0)], None)
        .await?;

    // A checkpoint written with a NaN quantity by an older build
    let path = checkpoint_file(&temp_dir, "broken");
    let mut value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    value["queue"][0]["quantity"] = serde_json::Value::Null;
    std::fs::write(&path, serde_json::to_string(&value)?)?;

    let err = engine
        .resume("broken", ConfirmationResponse::approve())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CHECKPOINT_CORRUPTED);

    let pending = engine.pending().await?;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].unreadable.is_some());
    assert!(engine.pending_request("broken").await.is_err());

    let discarded = engine.discard("broken").await?;
    assert!(matches!(discarded, DiscardedTurn::Unreadable { ref conversation_id, .. } if conversation_id == "broken"));
    assert!(engine.pending().await?.is_empty());
    assert!(engine
        .start_turn("broken", vec![PendingItem::new("egg", 50.0)], None)
        .await
        .is_ok());
    Ok(())
}
