//! Durable checkpoints of suspended turns
//!
//! One JSON file per conversation, written atomically through a temp file
//! and rename. A checkpoint exists exactly while a turn is unfinished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::TurnState;
use crate::error::{ErrorCode, FitpalError, Result};

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// Summary of a suspended turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTurn {
    pub conversation_id: String,
    /// `None` when the checkpoint cannot be read
    pub turn_id: Option<Uuid>,
    pub awaiting_decision: bool,
    /// Name of the item at the head of the queue
    pub item: Option<String>,
    pub remaining_items: usize,
    pub suspended_since: DateTime<Utc>,
    /// Why the checkpoint cannot be loaded; such a turn can only be discarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreadable: Option<String>,
}

impl From<&TurnState> for PendingTurn {
    fn from(state: &TurnState) -> Self {
        Self {
            conversation_id: state.conversation_id.clone(),
            turn_id: Some(state.turn_id),
            awaiting_decision: state.awaiting_decision,
            item: state.head().map(|item| item.name.clone()),
            remaining_items: state.queue.len(),
            suspended_since: state.updated_at,
            unreadable: None,
        }
    }
}

/// A checkpoint file found on disk
#[derive(Debug, Clone, PartialEq)]
pub enum StoredCheckpoint {
    Readable(TurnState),
    Unreadable {
        conversation_id: String,
        reason: String,
        modified_at: DateTime<Utc>,
    },
}

impl StoredCheckpoint {
    fn sort_key(&self) -> DateTime<Utc> {
        match self {
            Self::Readable(state) => state.updated_at,
            Self::Unreadable { modified_at, .. } => *modified_at,
        }
    }
}

impl From<&StoredCheckpoint> for PendingTurn {
    fn from(stored: &StoredCheckpoint) -> Self {
        match stored {
            StoredCheckpoint::Readable(state) => PendingTurn::from(state),
            StoredCheckpoint::Unreadable {
                conversation_id,
                reason,
                modified_at,
            } => Self {
                conversation_id: conversation_id.clone(),
                turn_id: None,
                awaiting_decision: false,
                item: None,
                remaining_items: 0,
                suspended_since: *modified_at,
                unreadable: Some(reason.clone()),
            },
        }
    }
}

/// Conversation ids become file names, so only a safe charset is accepted
pub fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    let valid = !conversation_id.is_empty()
        && conversation_id.len() <= 128
        && conversation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !conversation_id.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(FitpalError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_IDENTIFIER,
            format!(
                "conversation id '{}' must be 1-128 characters of [A-Za-z0-9._-] and not start with '.'",
                conversation_id
            ),
            Some("conversation_id".to_string()),
        ))
    }
}

pub struct CheckpointManager {
    storage_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    /// Save the turn state, replacing any previous checkpoint of the conversation
    pub async fn save(&self, state: &TurnState) -> Result<()> {
        validate_conversation_id(&state.conversation_id)?;
        let checkpoint_path = self.checkpoint_path(&state.conversation_id);

        if let Some(field) = state.non_finite_field() {
            return Err(FitpalError::turn(
                ErrorCode::CHECKPOINT_WRITE_FAILED,
                format!("refusing to checkpoint a non-finite number at {}", field),
                Some(state.conversation_id.clone()),
            ));
        }
        let temp_path = checkpoint_path.with_extension("tmp");

        let write = async {
            fs::create_dir_all(&self.storage_path).await?;
            let json = serde_json::to_string_pretty(state)?;
            fs::write(&temp_path, json).await?;
            fs::rename(&temp_path, &checkpoint_path).await?;
            Ok::<(), anyhow::Error>(())
        };

        write.await.map_err(|e| {
            FitpalError::turn(
                ErrorCode::CHECKPOINT_WRITE_FAILED,
                format!("failed to write checkpoint {}", checkpoint_path.display()),
                Some(state.conversation_id.clone()),
            )
            .with_source(e)
        })?;

        debug!(
            "Saved checkpoint for {} ({} items queued, awaiting decision: {})",
            state.conversation_id,
            state.queue.len(),
            state.awaiting_decision
        );
        Ok(())
    }

    /// Load the checkpoint of a conversation, if one exists
    pub async fn load(&self, conversation_id: &str) -> Result<Option<TurnState>> {
        validate_conversation_id(conversation_id)?;
        let checkpoint_path = self.checkpoint_path(conversation_id);

        if !checkpoint_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&checkpoint_path).await?;
        let state: TurnState = serde_json::from_str(&content).map_err(|e| {
            FitpalError::turn(
                ErrorCode::CHECKPOINT_CORRUPTED,
                format!("failed to parse checkpoint {}", checkpoint_path.display()),
                Some(conversation_id.to_string()),
            )
            .with_source(e)
        })?;

        if state.version > CHECKPOINT_VERSION {
            return Err(FitpalError::turn(
                ErrorCode::CHECKPOINT_INCOMPATIBLE_VERSION,
                format!(
                    "checkpoint version {} is newer than supported version {}",
                    state.version, CHECKPOINT_VERSION
                ),
                Some(conversation_id.to_string()),
            ));
        }

        if state.conversation_id != conversation_id {
            return Err(FitpalError::turn(
                ErrorCode::CHECKPOINT_CORRUPTED,
                format!(
                    "checkpoint belongs to conversation '{}'",
                    state.conversation_id
                ),
                Some(conversation_id.to_string()),
            ));
        }

        Ok(Some(state))
    }

    pub async fn exists(&self, conversation_id: &str) -> Result<bool> {
        validate_conversation_id(conversation_id)?;
        Ok(self.checkpoint_path(conversation_id).exists())
    }

    /// Delete the checkpoint of a finished or discarded turn
    pub async fn delete(&self, conversation_id: &str) -> Result<()> {
        validate_conversation_id(conversation_id)?;
        let checkpoint_path = self.checkpoint_path(conversation_id);
        if checkpoint_path.exists() {
            fs::remove_file(&checkpoint_path).await?;
            info!("Deleted checkpoint for conversation {}", conversation_id);
        }
        Ok(())
    }

    /// Every checkpoint on disk, oldest first.
    ///
    /// Files that fail to load are reported as unreadable rather than skipped,
    /// so their conversations stay visible until discarded.
    pub async fn list(&self) -> Result<Vec<StoredCheckpoint>> {
        let mut stored = Vec::new();

        if !self.storage_path.exists() {
            return Ok(stored);
        }

        let mut entries = fs::read_dir(&self.storage_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(conversation_id) = name.strip_suffix(CHECKPOINT_SUFFIX) else {
                continue;
            };
            match self.load(conversation_id).await {
                Ok(Some(state)) => stored.push(StoredCheckpoint::Readable(state)),
                Ok(None) => {}
                Err(e) => {
                    warn!("Unreadable checkpoint {}: {}", name, e);
                    let modified_at = entry
                        .metadata()
                        .await
                        .and_then(|meta| meta.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    stored.push(StoredCheckpoint::Unreadable {
                        conversation_id: conversation_id.to_string(),
                        reason: e.user_message(),
                        modified_at,
                    });
                }
            }
        }

        stored.sort_by_key(StoredCheckpoint::sort_key);
        Ok(stored)
    }

    fn checkpoint_path(&self, conversation_id: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}{}", conversation_id, CHECKPOINT_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::PendingItem;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_delete() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().join("checkpoints"));
        let state = TurnState::new("conv-1", vec![PendingItem::new("rice", 100.0)], None);

        manager.save(&state).await.unwrap();
        assert!(manager.exists("conv-1").await.unwrap());
        assert_eq!(manager.load("conv-1").await.unwrap(), Some(state));

        manager.delete("conv-1").await.unwrap();
        assert_eq!(manager.load("conv-1").await.unwrap(), None);
        assert!(!temp_dir
            .path()
            .join("checkpoints/conv-1.checkpoint.tmp")
            .exists());
    }

    #[tokio::test]
    async fn test_newer_version_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().to_path_buf());
        let mut state = TurnState::new("conv-2", vec![], None);
        state.version = CHECKPOINT_VERSION + 1;
        manager.save(&state).await.unwrap();

        let err = manager.load("conv-2").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CHECKPOINT_INCOMPATIBLE_VERSION);
    }

    #[tokio::test]
    async fn test_corrupted_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().to_path_buf());
        std::fs::write(temp_dir.path().join("conv-3.checkpoint.json"), "{ nope").unwrap();

        let err = manager.load("conv-3").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CHECKPOINT_CORRUPTED);

        let listed = manager.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        let pending = PendingTurn::from(&listed[0]);
        assert_eq!(pending.conversation_id, "conv-3");
        assert_eq!(pending.turn_id, None);
        assert!(pending.unreadable.is_some());
    }

    #[tokio::test]
    async fn test_non_finite_state_is_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().to_path_buf());
        let state = TurnState::new("conv-4", vec![PendingItem::new("rice", f64::NAN)], None);

        let err = manager.save(&state).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CHECKPOINT_WRITE_FAILED);
        assert!(!manager.exists("conv-4").await.unwrap());
    }

    #[tokio::test]
    async fn test_large_finite_values_survive_reload() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().to_path_buf());
        let state = TurnState::new(
            "conv-5",
            vec![PendingItem::new("rice", 1e300), PendingItem::new("salt", 1e-300)],
            None,
        );

        manager.save(&state).await.unwrap();
        assert_eq!(manager.load("conv-5").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_list_orders_by_age() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(temp_dir.path().to_path_buf());
        let mut older = TurnState::new("older", vec![PendingItem::new("egg", 50.0)], None);
        older.updated_at = older.updated_at - chrono::Duration::hours(2);
        let newer = TurnState::new("newer", vec![], None);
        manager.save(&newer).await.unwrap();
        manager.save(&older).await.unwrap();

        let listed: Vec<PendingTurn> = manager
            .list()
            .await
            .unwrap()
            .iter()
            .map(PendingTurn::from)
            .collect();
        let ids: Vec<_> = listed.iter().map(|p| p.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
        assert_eq!(listed[0].item.as_deref(), Some("egg"));
    }

    #[test]
    fn test_conversation_id_validation() {
        assert!(validate_conversation_id("telegram-1234_a.b").is_ok());
        assert!(validate_conversation_id("").is_err());
        assert!(validate_conversation_id("../etc/passwd").is_err());
        assert!(validate_conversation_id(".hidden").is_err());
        assert!(validate_conversation_id("a/b").is_err());
    }
}
