//! Per-conversation lock files
//!
//! A turn holds its conversation's lock from the moment it checks for an
//! unfinished checkpoint until its own checkpoint is saved or deleted. The
//! lock is a file created with `create_new`, so separate processes sharing
//! a checkpoint directory exclude each other. A lock left behind by a
//! process that no longer runs on this host is removed and acquisition retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{ErrorCode, FitpalError, Result};

const LOCKS_DIR: &str = "locks";

/// A lock file that never became valid JSON is treated as abandoned after this long
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(30);

/// Metadata stored in a lock file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockData {
    pub conversation_id: String,
    pub process_id: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockData {
    fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            process_id: std::process::id(),
            hostname: current_hostname(),
            acquired_at: Utc::now(),
        }
    }

    /// Held by a process of this host that has exited
    fn is_stale(&self) -> bool {
        self.hostname == current_hostname()
            && self.process_id != std::process::id()
            && !is_process_running(self.process_id)
    }
}

fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

enum Holder {
    Active(Option<LockData>),
    Stale(String),
    Gone,
}

/// Hands out conversation locks under `<checkpoint_dir>/locks`
#[derive(Clone, Debug)]
pub struct ConversationLocks {
    locks_dir: PathBuf,
}

impl ConversationLocks {
    pub fn new(checkpoint_dir: &Path) -> Self {
        Self {
            locks_dir: checkpoint_dir.join(LOCKS_DIR),
        }
    }

    /// Take the lock of a conversation or fail with `TURN_IN_PROGRESS`
    pub async fn acquire(&self, conversation_id: &str) -> Result<ConversationLock> {
        tokio::fs::create_dir_all(&self.locks_dir).await?;
        let lock_path = self.lock_path(conversation_id);

        // One retry after clearing a stale lock
        for _ in 0..2 {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(mut file) => {
                    let lock = ConversationLock {
                        conversation_id: conversation_id.to_string(),
                        lock_path: lock_path.clone(),
                    };
                    let json = serde_json::to_string_pretty(&LockData::new(conversation_id))?;
                    file.write_all(json.as_bytes()).await?;
                    file.flush().await?;
                    debug!("Acquired lock for conversation {}", conversation_id);
                    return Ok(lock);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match self.inspect(&lock_path).await {
                        Holder::Active(data) => return Err(in_progress(conversation_id, data)),
                        Holder::Stale(reason) => {
                            warn!(
                                "Removing stale lock for conversation {} ({})",
                                conversation_id, reason
                            );
                            match tokio::fs::remove_file(&lock_path).await {
                                Ok(()) => {}
                                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                                Err(e) => return Err(e.into()),
                            }
                        }
                        Holder::Gone => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(in_progress(conversation_id, None))
    }

    async fn inspect(&self, lock_path: &Path) -> Holder {
        let contents = match tokio::fs::read_to_string(lock_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Holder::Gone,
            Err(_) => return Holder::Active(None),
        };

        match serde_json::from_str::<LockData>(&contents) {
            Ok(data) if data.is_stale() => {
                Holder::Stale(format!("PID {} no longer running", data.process_id))
            }
            Ok(data) => Holder::Active(Some(data)),
            // The holder may still be writing its metadata
            Err(_) => {
                let age = tokio::fs::metadata(lock_path)
                    .await
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| SystemTime::now().duration_since(modified).ok());
                match age {
                    Some(age) if age > UNREADABLE_LOCK_GRACE => {
                        Holder::Stale(format!("unreadable for {}s", age.as_secs()))
                    }
                    _ => Holder::Active(None),
                }
            }
        }
    }

    fn lock_path(&self, conversation_id: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", conversation_id))
    }
}

fn in_progress(conversation_id: &str, holder: Option<LockData>) -> FitpalError {
    let message = match holder {
        Some(data) => format!(
            "conversation is being processed by PID {} on {} (since {})",
            data.process_id,
            data.hostname,
            data.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "conversation is being processed by another turn".to_string(),
    };
    FitpalError::turn(
        ErrorCode::TURN_IN_PROGRESS,
        message,
        Some(conversation_id.to_string()),
    )
}

/// Held conversation lock; the file is removed on drop
#[derive(Debug)]
pub struct ConversationLock {
    conversation_id: String,
    lock_path: PathBuf,
}

impl Drop for ConversationLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(
                "Failed to release lock for conversation {}: {}",
                self.conversation_id, e
            );
        } else {
            debug!("Released lock for conversation {}", self.conversation_id);
        }
    }
}

/// Check if a process with the given PID is running
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::{Command, Stdio};

        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        use std::process::{Command, Stdio};

        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.contains(&pid.to_string()))
            })
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Without process detection every lock counts as held
        let _ = pid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let locks = ConversationLocks::new(temp_dir.path());

        let lock = locks.acquire("c1").await.unwrap();
        let err = locks.acquire("c1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TURN_IN_PROGRESS);
        assert!(err.to_string().contains(&std::process::id().to_string()));

        // Other conversations are independent
        assert!(locks.acquire("c2").await.is_ok());

        drop(lock);
        assert!(!temp_dir.path().join("locks/c1.lock").exists());
        assert!(locks.acquire("c1").await.is_ok());
    }

    #[tokio::test]
    async fn test_second_manager_on_same_dir_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let first = ConversationLocks::new(temp_dir.path());
        let second = ConversationLocks::new(temp_dir.path());

        let _lock = first.acquire("shared").await.unwrap();
        let err = second.acquire("shared").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TURN_IN_PROGRESS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_of_exited_process_is_taken_over() {
        let temp_dir = TempDir::new().unwrap();
        let locks = ConversationLocks::new(temp_dir.path());

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        let stale = LockData {
            conversation_id: "c1".to_string(),
            process_id: dead_pid,
            hostname: current_hostname(),
            acquired_at: Utc::now(),
        };
        std::fs::create_dir_all(temp_dir.path().join("locks")).unwrap();
        std::fs::write(
            temp_dir.path().join("locks/c1.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let _lock = locks.acquire("c1").await.unwrap();
        let written: LockData = serde_json::from_str(
            &std::fs::read_to_string(temp_dir.path().join("locks/c1.lock")).unwrap(),
        )
        .unwrap();
        assert_eq!(written.process_id, std::process::id());
    }

    #[tokio::test]
    async fn test_fresh_unreadable_lock_counts_as_held() {
        let temp_dir = TempDir::new().unwrap();
        let locks = ConversationLocks::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join("locks")).unwrap();
        std::fs::write(temp_dir.path().join("locks/c1.lock"), "").unwrap();

        let err = locks.acquire("c1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TURN_IN_PROGRESS);
    }
}
