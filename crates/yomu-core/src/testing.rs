//! Test doubles for the store and the sync backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::models::{ConflictInfo, SyncConfig, SyncPayload};
use crate::store::{Collection, LocalStore};
use crate::sync::{AuthFlow, AuthStatus, MergeOutcome, PushOutcome, SyncRemote};
use crate::{Error, Result};

pub const REMOTE_TIMESTAMP: i64 = 1_700_000_000_000;

/// Store wrapper whose reads from one collection always fail.
pub struct FailingStore<S> {
    inner: S,
    failing: Collection,
}

impl<S> FailingStore<S> {
    pub const fn new(inner: S, failing: Collection) -> Self {
        Self { inner, failing }
    }
}

impl<S: LocalStore> LocalStore for FailingStore<S> {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        if collection == self.failing {
            return Err(Error::Storage(format!("cannot read {collection}/{key}")));
        }
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()> {
        self.inner.set(collection, key, value).await
    }

    async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.inner.remove(collection, key).await
    }

    async fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        self.inner.keys(collection).await
    }
}

/// Store wrapper counting `keys` calls per collection.
pub struct CountingStore<S> {
    inner: S,
    key_listings: Mutex<BTreeMap<Collection, usize>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            key_listings: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn key_listings(&self, collection: Collection) -> usize {
        self.key_listings
            .lock()
            .unwrap()
            .get(&collection)
            .copied()
            .unwrap_or(0)
    }
}

impl<S: LocalStore> LocalStore for CountingStore<S> {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()> {
        self.inner.set(collection, key, value).await
    }

    async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.inner.remove(collection, key).await
    }

    async fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        *self
            .key_listings
            .lock()
            .unwrap()
            .entry(collection)
            .or_default() += 1;
        self.inner.keys(collection).await
    }
}

/// Scripted in-process backend.
///
/// `merge` echoes the uploaded payload unless `merged` is set, and can be held
/// open with a gate to simulate a slow request.
#[derive(Default)]
pub struct FakeRemote {
    pub connected: Mutex<bool>,
    pub merged: Mutex<Option<SyncPayload>>,
    pub stored: Mutex<Option<SyncPayload>>,
    pub conflicts: Mutex<Vec<ConflictInfo>>,
    pub files_to_upload: Mutex<Vec<String>>,
    pub files_to_download: Mutex<Vec<String>>,
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub config: Mutex<SyncConfig>,
    pub fail_with_status: Mutex<Option<u16>>,
    pub merge_gate: Option<Arc<Notify>>,
    pub calls: Mutex<Vec<String>>,
    pub pushed_etags: Mutex<Vec<Option<String>>>,
    pub uploaded: Mutex<Vec<SyncPayload>>,
}

impl FakeRemote {
    pub fn connected() -> Self {
        Self {
            connected: Mutex::new(true),
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            merge_gate: Some(gate),
            ..Self::connected()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        match *self.fail_with_status.lock().unwrap() {
            Some(status) => Err(Error::Api {
                status,
                message: format!("{call} failed"),
            }),
            None => Ok(()),
        }
    }
}

impl SyncRemote for FakeRemote {
    async fn merge(
        &self,
        payload: &SyncPayload,
        _config: Option<&SyncConfig>,
    ) -> Result<MergeOutcome> {
        if let Some(gate) = &self.merge_gate {
            gate.notified().await;
        }
        self.record("merge")?;
        self.uploaded.lock().unwrap().push(payload.clone());
        let merged = self
            .merged
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| payload.clone());
        Ok(MergeOutcome {
            payload: merged,
            sync_timestamp: REMOTE_TIMESTAMP,
            files_to_upload: self.files_to_upload.lock().unwrap().clone(),
            files_to_download: self.files_to_download.lock().unwrap().clone(),
            conflicts: self.conflicts.lock().unwrap().clone(),
        })
    }

    async fn pull(&self) -> Result<Option<SyncPayload>> {
        self.record("pull")?;
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn push(&self, payload: &SyncPayload, etag: Option<&str>) -> Result<PushOutcome> {
        self.record("push")?;
        let mut pushed = self.pushed_etags.lock().unwrap();
        pushed.push(etag.map(ToString::to_string));
        *self.stored.lock().unwrap() = Some(payload.clone());
        Ok(PushOutcome {
            success: true,
            etag: Some(format!("etag-{}", pushed.len())),
            sync_timestamp: REMOTE_TIMESTAMP,
        })
    }

    async fn status(&self) -> Result<AuthStatus> {
        self.record("status")?;
        Ok(AuthStatus {
            connected: *self.connected.lock().unwrap(),
            device_id: "server".to_string(),
            ..AuthStatus::default()
        })
    }

    async fn get_config(&self) -> Result<SyncConfig> {
        self.record("get_config")?;
        Ok(self.config.lock().unwrap().clone())
    }

    async fn set_config(&self, config: &SyncConfig) -> Result<SyncConfig> {
        self.record("set_config")?;
        *self.config.lock().unwrap() = config.clone();
        Ok(config.clone())
    }

    async fn start_auth(&self, redirect_uri: &str) -> Result<AuthFlow> {
        self.record("start_auth")?;
        Ok(AuthFlow {
            auth_url: format!("https://accounts.example.com/auth?redirect_uri={redirect_uri}"),
            state: "state-1".to_string(),
        })
    }

    async fn complete_auth(
        &self,
        _code: &str,
        _state: Option<&str>,
        _redirect_uri: &str,
    ) -> Result<()> {
        self.record("complete_auth")?;
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect")?;
        *self.connected.lock().unwrap() = false;
        Ok(())
    }

    async fn upload_file(&self, file_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.record("upload_file")?;
        self.files.lock().unwrap().insert(file_id.to_string(), bytes);
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.record("download_file")?;
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("no file {file_id}"),
            })
    }
}
