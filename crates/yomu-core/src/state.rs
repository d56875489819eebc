//! Observable sync state shared with hosts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::models::ConflictInfo;
use crate::sync::SyncProgress;

/// Coarse sync state for status badges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Failure recorded by the last sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for SyncFailure {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Snapshot of the sync service, published after every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub connected: bool,
    pub last_sync_time: Option<i64>,
    pub error: Option<SyncFailure>,
    /// Latest progress event of the running sync, cleared when it ends
    pub progress: Option<SyncProgress>,
    pub last_conflicts: Vec<ConflictInfo>,
}

impl SyncStatus {
    pub const fn state(&self) -> SyncState {
        if self.is_syncing {
            SyncState::Syncing
        } else if self.error.is_some() {
            SyncState::Error
        } else if self.connected && self.last_sync_time.is_some() {
            SyncState::Synced
        } else {
            SyncState::Offline
        }
    }
}
