//! Device identity and per-device sync bookkeeping

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ConflictInfo;
use crate::store::{get_json, set_json, Collection, LocalStore};
use crate::{Error, Result};

const IDENTITY_KEY: &str = "identity";
const CONFLICTS_KEY: &str = "last_conflicts";

/// Who this device is and where its last sync left off.
///
/// Constructed explicitly and handed to the sync service, so tests can supply
/// a fixed identity without touching persistent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIdentity {
    pub device_id: String,
    /// Server timestamp of the last completed sync (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
    /// Version tag returned by the last push
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_etag: Option<String>,
}

impl SyncIdentity {
    /// Identity with a fixed device id and no sync history.
    pub fn new(device_id: impl Into<String>) -> Result<Self> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(Error::InvalidInput("device id must not be empty".to_string()));
        }
        Ok(Self {
            device_id,
            last_sync_time: None,
            last_etag: None,
        })
    }

    /// Identity with a freshly generated device id.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            device_id: Uuid::now_v7().to_string(),
            last_sync_time: None,
            last_etag: None,
        }
    }

    /// Load the persisted identity, generating and saving one on first use.
    pub async fn load_or_create<S: LocalStore>(store: &S) -> Result<Self> {
        if let Some(identity) = get_json::<_, Self>(store, Collection::SyncState, IDENTITY_KEY).await? {
            return Ok(identity);
        }

        let identity = Self::generate();
        identity.save(store).await?;
        tracing::info!(device_id = %identity.device_id, "Generated device identity");
        Ok(identity)
    }

    pub async fn save<S: LocalStore>(&self, store: &S) -> Result<()> {
        set_json(store, Collection::SyncState, IDENTITY_KEY, self).await
    }

    /// Record a completed sync and persist the result.
    pub async fn record_sync<S: LocalStore>(
        &mut self,
        store: &S,
        sync_timestamp: i64,
        etag: Option<String>,
    ) -> Result<()> {
        self.last_sync_time = Some(sync_timestamp);
        if etag.is_some() {
            self.last_etag = etag;
        }
        self.save(store).await
    }
}

/// Conflicts reported by the most recent sync.
pub async fn load_conflicts<S: LocalStore>(store: &S) -> Result<Vec<ConflictInfo>> {
    Ok(get_json(store, Collection::SyncState, CONFLICTS_KEY)
        .await?
        .unwrap_or_default())
}

/// Replace the persisted conflict list.
pub async fn save_conflicts<S: LocalStore>(store: &S, conflicts: &[ConflictInfo]) -> Result<()> {
    set_json(store, Collection::SyncState, CONFLICTS_KEY, &conflicts).await
}
