//! Sync orchestration
//!
//! `SyncService` owns the local store and the backend client and runs one
//! cycle at a time: collect, merge, transfer files, apply. Requests made while
//! a cycle is running or while the backend is disconnected are ignored.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{watch, Mutex};

use super::apply::{apply, ApplyReport};
use super::auth::{parse_auth_return, AuthFlow, AuthReturn, AuthStatus};
use super::client::SyncRemote;
use super::collect::collect;
use super::progress::{NoProgress, PhaseReporter, ProgressSink, SyncPhase, SyncProgress};
use super::resolve::{merge_remote_progress, ProgressMergeReport};
use crate::identity::{load_conflicts, save_conflicts, SyncIdentity};
use crate::models::{CategorySelection, ConflictInfo, Progress, SyncConfig};
use crate::state::{SyncFailure, SyncStatus};
use crate::store::library::{self, clear_deletions};
use crate::store::{Collection, LocalStore};
use crate::util::unix_millis_now;
use crate::{Error, ErrorKind, Result};

/// Host events that may start a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    AppStart,
    AppResume,
    ChapterRead,
    ChapterOpen,
}

impl SyncTrigger {
    const fn enabled(self, config: &SyncConfig) -> bool {
        match self {
            Self::AppStart => config.sync_on_app_start,
            Self::AppResume => config.sync_on_app_resume,
            Self::ChapterRead => config.sync_on_chapter_read,
            Self::ChapterOpen => config.sync_on_chapter_open,
        }
    }
}

/// Result of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub sync_timestamp: i64,
    pub applied: ApplyReport,
    pub conflicts: Vec<ConflictInfo>,
    pub files_uploaded: usize,
    pub files_downloaded: usize,
}

/// How a sync request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    /// Not started: already running, disconnected, or disabled by config
    Skipped,
    Completed(SyncOutcome),
    Failed(SyncFailure),
}

impl SyncRun {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct SyncService<S, R> {
    store: S,
    remote: R,
    identity: Mutex<SyncIdentity>,
    config: Mutex<SyncConfig>,
    syncing: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl<S: LocalStore, R: SyncRemote> SyncService<S, R> {
    /// Build a service around an explicit identity and config.
    pub fn new(store: S, remote: R, identity: SyncIdentity, config: SyncConfig) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            last_sync_time: identity.last_sync_time,
            ..SyncStatus::default()
        });
        Self {
            store,
            remote,
            identity: Mutex::new(identity),
            config: Mutex::new(config),
            syncing: AtomicBool::new(false),
            status,
        }
    }

    /// Build a service from the identity and conflicts persisted in `store`.
    pub async fn open(store: S, remote: R, config: SyncConfig) -> Result<Self> {
        let identity = SyncIdentity::load_or_create(&store).await?;
        let conflicts = load_conflicts(&store).await?;
        let service = Self::new(store, remote, identity, config);
        service
            .status
            .send_modify(|status| status.last_conflicts = conflicts);
        Ok(service)
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Watch status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub async fn identity(&self) -> SyncIdentity {
        self.identity.lock().await.clone()
    }

    /// Cached sync preferences.
    pub async fn config(&self) -> SyncConfig {
        self.config.lock().await.clone()
    }

    /// Ask the backend whether it is connected and cache the answer.
    ///
    /// An authentication failure marks the service disconnected.
    pub async fn refresh_status(&self) -> Result<AuthStatus> {
        match self.remote.status().await {
            Ok(auth) => {
                self.status
                    .send_modify(|status| status.connected = auth.connected);
                Ok(auth)
            }
            Err(error) => {
                if error.kind() == ErrorKind::Auth {
                    self.status.send_modify(|status| status.connected = false);
                }
                Err(error)
            }
        }
    }

    /// Fetch the synced preferences from the backend.
    pub async fn load_config(&self) -> Result<SyncConfig> {
        let config = self.remote.get_config().await?;
        *self.config.lock().await = config.clone();
        Ok(config)
    }

    /// Save preferences on the backend and cache what it stored.
    pub async fn update_config(&self, config: &SyncConfig) -> Result<SyncConfig> {
        let saved = self.remote.set_config(config).await?;
        *self.config.lock().await = saved.clone();
        tracing::info!(
            progress = saved.ln_progress,
            metadata = saved.ln_metadata,
            content = saved.ln_content,
            files = saved.ln_files,
            "Sync config updated"
        );
        Ok(saved)
    }

    /// Full cycle: collect, merge, transfer files, apply.
    pub async fn sync(&self, sink: &dyn ProgressSink) -> SyncRun {
        let Some(_run) = self.begin("sync") else {
            return SyncRun::Skipped;
        };
        let sink = StatusSink {
            status: &self.status,
            outer: sink,
        };
        match self.run_merge(&sink).await {
            Ok(outcome) => self.complete(outcome),
            Err(error) => self.fail(&error),
        }
    }

    /// Fetch remote state and apply it without uploading.
    pub async fn pull_only(&self, sink: &dyn ProgressSink) -> SyncRun {
        let Some(_run) = self.begin("pull") else {
            return SyncRun::Skipped;
        };
        let sink = StatusSink {
            status: &self.status,
            outer: sink,
        };
        match self.run_pull(&sink).await {
            Ok(outcome) => self.complete(outcome),
            Err(error) => self.fail(&error),
        }
    }

    /// Upload local state without merging.
    pub async fn push_only(&self, sink: &dyn ProgressSink) -> SyncRun {
        let Some(_run) = self.begin("push") else {
            return SyncRun::Skipped;
        };
        let sink = StatusSink {
            status: &self.status,
            outer: sink,
        };
        match self.run_push(&sink).await {
            Ok(outcome) => self.complete(outcome),
            Err(error) => self.fail(&error),
        }
    }

    /// Application launched: refresh connection and config, then maybe sync.
    pub async fn on_app_start(&self) -> SyncRun {
        match self.refresh_status().await {
            Ok(auth) if auth.connected => {
                if let Err(error) = self.load_config().await {
                    tracing::warn!("Using cached sync config: {error}");
                }
            }
            Ok(_) => return SyncRun::Skipped,
            Err(error) => {
                tracing::warn!("Could not reach sync backend on start: {error}");
                return SyncRun::Skipped;
            }
        }
        self.on_trigger(SyncTrigger::AppStart).await
    }

    pub async fn on_app_resume(&self) -> SyncRun {
        self.on_trigger(SyncTrigger::AppResume).await
    }

    pub async fn on_chapter_read(&self) -> SyncRun {
        self.on_trigger(SyncTrigger::ChapterRead).await
    }

    pub async fn on_chapter_open(&self) -> SyncRun {
        self.on_trigger(SyncTrigger::ChapterOpen).await
    }

    /// Run a sync if the trigger is enabled in the cached config.
    pub async fn on_trigger(&self, trigger: SyncTrigger) -> SyncRun {
        if !trigger.enabled(&*self.config.lock().await) {
            tracing::debug!(?trigger, "Auto-sync trigger disabled");
            return SyncRun::Skipped;
        }
        self.sync(&NoProgress).await
    }

    /// Reconcile progress records that arrived outside a full cycle.
    pub async fn merge_remote_progress(
        &self,
        remote: &BTreeMap<String, Progress>,
    ) -> Result<ProgressMergeReport> {
        let report = merge_remote_progress(&self.store, remote).await?;
        if !report.conflicts.is_empty() {
            save_conflicts(&self.store, &report.conflicts).await?;
            let conflicts = report.conflicts.clone();
            self.status
                .send_modify(|status| status.last_conflicts = conflicts);
        }
        Ok(report)
    }

    /// Save a reading position stamped with this device's id.
    pub async fn save_progress(&self, book_id: &str, progress: Progress) -> Result<Progress> {
        let device_id = self.identity.lock().await.device_id.clone();
        library::save_progress(&self.store, book_id, &device_id, progress).await
    }

    /// Remove a book locally; the removal ships with the next sync.
    pub async fn remove_book(&self, book_id: &str) -> Result<()> {
        library::remove_book(&self.store, book_id).await
    }

    /// Begin the connect flow.
    pub async fn start_auth(&self, redirect_uri: &str) -> Result<AuthFlow> {
        self.remote.start_auth(redirect_uri).await
    }

    /// Finish the connect flow from the redirect query.
    pub async fn complete_auth(&self, query: &str, redirect_uri: &str) -> Result<AuthStatus> {
        if let AuthReturn::Callback { code, state } = parse_auth_return(query)? {
            self.remote
                .complete_auth(&code, state.as_deref(), redirect_uri)
                .await?;
        }
        let auth = self.refresh_status().await?;
        if !auth.connected {
            return Err(Error::NotAuthenticated);
        }
        tracing::info!(backend = ?auth.backend, "Connected to sync backend");
        Ok(auth)
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.remote.disconnect().await?;
        self.status.send_modify(|status| status.connected = false);
        tracing::info!("Disconnected from sync backend");
        Ok(())
    }

    fn begin(&self, operation: &'static str) -> Option<RunGuard<'_>> {
        if !self.status.borrow().connected {
            tracing::debug!(operation, "Sync skipped: backend not connected");
            return None;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(operation, "Sync skipped: already running");
            return None;
        }

        tracing::info!(operation, "Sync started");
        self.status.send_modify(|status| {
            status.is_syncing = true;
            status.error = None;
            status.progress = None;
        });
        Some(RunGuard {
            syncing: &self.syncing,
            status: &self.status,
        })
    }

    fn complete(&self, outcome: SyncOutcome) -> SyncRun {
        tracing::info!(
            written = outcome.applied.written(),
            conflicts = outcome.conflicts.len(),
            "Sync complete"
        );
        self.status.send_modify(|status| {
            status.last_sync_time = Some(outcome.sync_timestamp);
            status.last_conflicts = outcome.conflicts.clone();
        });
        SyncRun::Completed(outcome)
    }

    fn fail(&self, error: &Error) -> SyncRun {
        let failure = SyncFailure::from(error);
        tracing::warn!(kind = ?failure.kind, "Sync failed: {}", failure.message);
        let recorded = failure.clone();
        self.status
            .send_modify(|status| status.error = Some(recorded));
        SyncRun::Failed(failure)
    }

    async fn run_merge(&self, sink: &dyn ProgressSink) -> Result<SyncOutcome> {
        let config = self.config().await;
        let selection = config.selection();
        let device_id = self.identity.lock().await.device_id.clone();

        let payload = collect(&self.store, &device_id, &selection, sink).await?;

        let mut uploading = PhaseReporter::new(sink, SyncPhase::Uploading, 1);
        uploading.message("Merging with sync backend");
        let merged = self.remote.merge(&payload, Some(&config)).await?;
        uploading.step(format!("Merged {} books", merged.payload.book_ids().len()));

        let (files_uploaded, files_downloaded) = self
            .transfer_files(&merged.files_to_upload, &merged.files_to_download, &selection, sink)
            .await?;

        let applied = apply(
            &self.store,
            &merged.payload,
            &selection,
            config.deletion_behavior,
            sink,
        )
        .await?;

        clear_deletions(&self.store, &payload.deletions).await?;
        self.record(merged.sync_timestamp, None, &merged.conflicts)
            .await?;

        Ok(SyncOutcome {
            sync_timestamp: merged.sync_timestamp,
            applied,
            conflicts: merged.conflicts,
            files_uploaded,
            files_downloaded,
        })
    }

    async fn run_pull(&self, sink: &dyn ProgressSink) -> Result<SyncOutcome> {
        let config = self.config().await;

        let mut downloading = PhaseReporter::new(sink, SyncPhase::Downloading, 1);
        downloading.message("Fetching remote library");
        let remote = self.remote.pull().await?;

        let applied = match remote {
            Some(payload) => {
                downloading.step(format!("Fetched {} books", payload.book_ids().len()));
                apply(
                    &self.store,
                    &payload,
                    &config.selection(),
                    config.deletion_behavior,
                    sink,
                )
                .await?
            }
            None => {
                downloading.step("Nothing stored remotely");
                ApplyReport::default()
            }
        };

        let sync_timestamp = unix_millis_now();
        self.record(sync_timestamp, None, &[]).await?;
        Ok(SyncOutcome {
            sync_timestamp,
            applied,
            ..SyncOutcome::default()
        })
    }

    async fn run_push(&self, sink: &dyn ProgressSink) -> Result<SyncOutcome> {
        let config = self.config().await;
        let (device_id, etag) = {
            let identity = self.identity.lock().await;
            (identity.device_id.clone(), identity.last_etag.clone())
        };

        let payload = collect(&self.store, &device_id, &config.selection(), sink).await?;

        let mut uploading = PhaseReporter::new(sink, SyncPhase::Uploading, 1);
        uploading.message("Uploading local library");
        let pushed = self.remote.push(&payload, etag.as_deref()).await?;
        if !pushed.success {
            return Err(Error::Api {
                status: 409,
                message: "sync backend rejected the upload".to_string(),
            });
        }
        uploading.step("Upload accepted");

        clear_deletions(&self.store, &payload.deletions).await?;
        self.record(pushed.sync_timestamp, pushed.etag, &[]).await?;
        Ok(SyncOutcome {
            sync_timestamp: pushed.sync_timestamp,
            ..SyncOutcome::default()
        })
    }

    async fn transfer_files(
        &self,
        uploads: &[String],
        downloads: &[String],
        selection: &CategorySelection,
        sink: &dyn ProgressSink,
    ) -> Result<(usize, usize)> {
        if !selection.files || (uploads.is_empty() && downloads.is_empty()) {
            return Ok((0, 0));
        }

        let mut reporter =
            PhaseReporter::new(sink, SyncPhase::Transferring, uploads.len() + downloads.len());
        reporter.message("Transferring book files");

        let mut uploaded = 0;
        for file_id in uploads {
            match self.store.get(Collection::Files, file_id).await? {
                Some(bytes) => {
                    self.remote.upload_file(file_id, bytes).await?;
                    uploaded += 1;
                    reporter.step(format!("Uploaded {file_id}"));
                }
                None => {
                    tracing::warn!(file_id, "Requested upload of a file that is not stored locally");
                    reporter.step(format!("Skipped {file_id}"));
                }
            }
        }

        let mut downloaded = 0;
        for file_id in downloads {
            let bytes = self.remote.download_file(file_id).await?;
            self.store.set(Collection::Files, file_id, &bytes).await?;
            downloaded += 1;
            reporter.step(format!("Downloaded {file_id}"));
        }

        Ok((uploaded, downloaded))
    }

    async fn record(
        &self,
        sync_timestamp: i64,
        etag: Option<String>,
        conflicts: &[ConflictInfo],
    ) -> Result<()> {
        self.identity
            .lock()
            .await
            .record_sync(&self.store, sync_timestamp, etag)
            .await?;
        save_conflicts(&self.store, conflicts).await
    }
}

/// Clears the running flag and progress when a cycle ends, however it ends.
struct RunGuard<'a> {
    syncing: &'a AtomicBool,
    status: &'a watch::Sender<SyncStatus>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.syncing.store(false, Ordering::Release);
        self.status.send_modify(|status| {
            status.is_syncing = false;
            status.progress = None;
        });
    }
}

/// Mirrors progress into the status channel before passing it on.
struct StatusSink<'a> {
    status: &'a watch::Sender<SyncStatus>,
    outer: &'a dyn ProgressSink,
}

impl ProgressSink for StatusSink<'_> {
    fn report(&self, progress: SyncProgress) {
        let latest = progress.clone();
        self.status
            .send_modify(|status| status.progress = Some(latest));
        self.outer.report(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookStats, DeletionBehavior, SyncPayload};
    use crate::store::{get_json, MemoryStore};
    use crate::sync::ChannelProgress;
    use crate::testing::{CountingStore, FakeRemote, REMOTE_TIMESTAMP};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::Notify;

    async fn connected_service(
        remote: FakeRemote,
        config: SyncConfig,
    ) -> SyncService<MemoryStore, FakeRemote> {
        let identity = SyncIdentity::new("device-a").unwrap();
        let service = SyncService::new(MemoryStore::new(), remote, identity, config);
        service.refresh_status().await.unwrap();
        service
    }

    fn remote_progress(total_progress: f64) -> Progress {
        Progress {
            chapter_index: 2,
            total_progress,
            last_modified: Some(500),
            sync_version: 7,
            device_id: Some("device-b".to_string()),
            ..Progress::default()
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sync_is_ignored_while_disconnected() {
        let service = SyncService::new(
            MemoryStore::new(),
            FakeRemote::default(),
            SyncIdentity::new("device-a").unwrap(),
            SyncConfig::default(),
        );
        service.refresh_status().await.unwrap();

        assert_eq!(service.sync(&NoProgress).await, SyncRun::Skipped);
        assert_eq!(service.push_only(&NoProgress).await, SyncRun::Skipped);
        assert_eq!(service.remote().calls(), vec!["status"]);
        assert!(service.status().error.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_sync_collects_once() {
        let gate = Arc::new(Notify::new());
        let service = SyncService::new(
            CountingStore::new(MemoryStore::new()),
            FakeRemote::gated(Arc::clone(&gate)),
            SyncIdentity::new("device-a").unwrap(),
            SyncConfig::default(),
        );
        service.refresh_status().await.unwrap();

        let (first, second) = tokio::join!(service.sync(&NoProgress), async {
            tokio::task::yield_now().await;
            let second = service.sync(&NoProgress).await;
            gate.notify_one();
            second
        });

        assert!(first.is_completed());
        assert_eq!(second, SyncRun::Skipped);
        assert_eq!(service.store().key_listings(Collection::Progress), 1);
        assert!(!service.is_syncing());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sync_applies_merged_payload_and_records_it() {
        let remote = FakeRemote::connected();
        let mut merged = SyncPayload::new("device-b");
        merged
            .ln_progress
            .insert("remote-book".to_string(), remote_progress(70.0));
        *remote.merged.lock().unwrap() = Some(merged);
        *remote.conflicts.lock().unwrap() = vec![ConflictInfo {
            book_id: "remote-book".to_string(),
            field: "progress".to_string(),
            local_value: serde_json::json!(40.0),
            remote_value: serde_json::json!(70.0),
            resolution: "remote".to_string(),
        }];
        let service = connected_service(remote, SyncConfig::default()).await;
        service
            .save_progress("local-book", Progress::default())
            .await
            .unwrap();

        let SyncRun::Completed(outcome) = service.sync(&NoProgress).await else {
            panic!("sync should complete");
        };

        assert_eq!(outcome.sync_timestamp, REMOTE_TIMESTAMP);
        assert_eq!(outcome.applied.progress, 1);
        let uploaded = service.remote().uploaded.lock().unwrap().clone();
        assert!(uploaded[0].ln_progress.contains_key("local-book"));

        let stored: Progress = get_json(service.store(), Collection::Progress, "remote-book")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, remote_progress(70.0));

        let status = service.status();
        assert_eq!(status.last_sync_time, Some(REMOTE_TIMESTAMP));
        assert_eq!(status.last_conflicts.len(), 1);
        assert_eq!(
            service.identity().await.last_sync_time,
            Some(REMOTE_TIMESTAMP)
        );
        assert_eq!(load_conflicts(service.store()).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_is_recorded_and_leaves_store_untouched() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        service
            .save_progress("book", Progress::default())
            .await
            .unwrap();
        let before = service.store().snapshot().unwrap();
        *service.remote().fail_with_status.lock().unwrap() = Some(503);

        let SyncRun::Failed(failure) = service.sync(&NoProgress).await else {
            panic!("sync should fail");
        };

        assert_eq!(failure.kind, ErrorKind::Network);
        let status = service.status();
        assert_eq!(status.error, Some(failure));
        assert!(!status.is_syncing);
        assert!(status.progress.is_none());
        assert!(status.last_sync_time.is_none());
        assert_eq!(service.store().snapshot().unwrap(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_files_are_neither_sent_nor_transferred() {
        let remote = FakeRemote::connected();
        let mut merged = SyncPayload::new("device-b");
        merged.ln_files = Some(BTreeMap::from([(
            "remote-book".to_string(),
            crate::codec::encode_blob(b"archive"),
        )]));
        *remote.merged.lock().unwrap() = Some(merged);
        *remote.files_to_download.lock().unwrap() = vec!["remote-book".to_string()];
        let service = connected_service(remote, SyncConfig::default()).await;
        library::save_file(service.store(), "local-book", b"local")
            .await
            .unwrap();

        let SyncRun::Completed(outcome) = service.sync(&NoProgress).await else {
            panic!("sync should complete");
        };

        assert_eq!(outcome.files_downloaded, 0);
        assert!(service.remote().uploaded.lock().unwrap()[0].ln_files.is_none());
        assert!(!service.remote().calls().contains(&"download_file".to_string()));
        assert_eq!(
            service.store().keys(Collection::Files).await.unwrap(),
            vec!["local-book"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enabled_files_follow_transfer_directives() {
        let remote = FakeRemote::connected();
        *remote.files_to_upload.lock().unwrap() = vec!["book-1".to_string(), "missing".to_string()];
        *remote.files_to_download.lock().unwrap() = vec!["book-2".to_string()];
        remote
            .files
            .lock()
            .unwrap()
            .insert("book-2".to_string(), b"second".to_vec());
        let config = SyncConfig {
            ln_files: true,
            ..SyncConfig::default()
        };
        let service = connected_service(remote, config).await;
        library::save_file(service.store(), "book-1", b"first")
            .await
            .unwrap();

        let SyncRun::Completed(outcome) = service.sync(&NoProgress).await else {
            panic!("sync should complete");
        };

        assert_eq!((outcome.files_uploaded, outcome.files_downloaded), (1, 1));
        assert_eq!(
            service.remote().files.lock().unwrap().get("book-1"),
            Some(&b"first".to_vec())
        );
        assert_eq!(
            service.store().get(Collection::Files, "book-2").await.unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn progress_events_follow_phase_order() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        service
            .save_progress("book", Progress::default())
            .await
            .unwrap();
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

        assert!(service
            .sync(&ChannelProgress(sender))
            .await
            .is_completed());

        let mut phases = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if phases.last() != Some(&event.phase) {
                phases.push(event.phase);
            }
        }
        assert_eq!(
            phases,
            vec![SyncPhase::Collecting, SyncPhase::Uploading, SyncPhase::Applying]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn shipped_tombstones_are_cleared() {
        let config = SyncConfig {
            deletion_behavior: DeletionBehavior::DeleteEverywhere,
            ..SyncConfig::default()
        };
        let service = connected_service(FakeRemote::connected(), config).await;
        service
            .save_progress("book", Progress::default())
            .await
            .unwrap();
        service.remove_book("book").await.unwrap();

        assert!(service.sync(&NoProgress).await.is_completed());

        let uploaded = service.remote().uploaded.lock().unwrap().clone();
        assert!(uploaded[0].deletions.book_ids.contains("book"));
        assert!(library::load_deletions(service.store())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn readded_book_survives_sync_with_delete_everywhere() {
        let config = SyncConfig {
            deletion_behavior: DeletionBehavior::DeleteEverywhere,
            ..SyncConfig::default()
        };
        let service = connected_service(FakeRemote::connected(), config).await;
        service
            .save_progress("book", Progress::default())
            .await
            .unwrap();
        service.remove_book("book").await.unwrap();
        service
            .save_progress(
                "book",
                Progress {
                    chapter_index: 4,
                    ..Progress::default()
                },
            )
            .await
            .unwrap();

        assert!(service.sync(&NoProgress).await.is_completed());

        let uploaded = service.remote().uploaded.lock().unwrap().clone();
        assert!(!uploaded[0].deletions.book_ids.contains("book"));
        let stored = library::get_progress(service.store(), "book")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.chapter_index, 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_only_sends_previous_etag() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;

        assert!(service.push_only(&NoProgress).await.is_completed());
        assert!(service.push_only(&NoProgress).await.is_completed());

        assert_eq!(
            service.remote().pushed_etags.lock().unwrap().clone(),
            vec![None, Some("etag-1".to_string())]
        );
        assert_eq!(
            service.identity().await.last_etag.as_deref(),
            Some("etag-2")
        );
        assert!(!service.remote().calls().contains(&"merge".to_string()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pull_only_applies_remote_state() {
        let remote = FakeRemote::connected();
        let mut stored = SyncPayload::new("device-b");
        stored
            .ln_progress
            .insert("book".to_string(), remote_progress(20.0));
        *remote.stored.lock().unwrap() = Some(stored);
        let service = connected_service(remote, SyncConfig::default()).await;

        let SyncRun::Completed(outcome) = service.pull_only(&NoProgress).await else {
            panic!("pull should complete");
        };
        assert_eq!(outcome.applied.progress, 1);
        assert!(service.remote().uploaded.lock().unwrap().is_empty());

        *service.remote().stored.lock().unwrap() = None;
        let SyncRun::Completed(outcome) = service.pull_only(&NoProgress).await else {
            panic!("empty pull should complete");
        };
        assert_eq!(outcome.applied, ApplyReport::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn triggers_follow_config_flags() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        assert_eq!(service.on_app_resume().await, SyncRun::Skipped);
        assert_eq!(service.on_chapter_read().await, SyncRun::Skipped);

        service
            .update_config(&SyncConfig {
                sync_on_app_resume: true,
                ..SyncConfig::default()
            })
            .await
            .unwrap();
        assert!(service.on_app_resume().await.is_completed());
        assert_eq!(service.on_chapter_open().await, SyncRun::Skipped);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn app_start_loads_remote_config_before_syncing() {
        let remote = FakeRemote::connected();
        *remote.config.lock().unwrap() = SyncConfig {
            sync_on_app_start: true,
            ..SyncConfig::default()
        };
        let service = SyncService::new(
            MemoryStore::new(),
            remote,
            SyncIdentity::new("device-a").unwrap(),
            SyncConfig::default(),
        );

        assert!(service.on_app_start().await.is_completed());
        assert_eq!(
            service.remote().calls(),
            vec!["status", "get_config", "merge"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remote_progress_conflicts_reach_status() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        let local = Progress {
            chapter_index: 1,
            total_progress: 50.0,
            last_modified: Some(500),
            device_id: Some("device-a".to_string()),
            ..Progress::default()
        };
        crate::store::set_json(service.store(), Collection::Progress, "book", &local)
            .await
            .unwrap();

        let remote = BTreeMap::from([("book".to_string(), remote_progress(50.0))]);
        let report = service.merge_remote_progress(&remote).await.unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(service.status().last_conflicts, report.conflicts);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auth_flow_connects_and_disconnects() {
        let service = SyncService::new(
            MemoryStore::new(),
            FakeRemote::default(),
            SyncIdentity::new("device-a").unwrap(),
            SyncConfig::default(),
        );
        let flow = service.start_auth("http://localhost/settings").await.unwrap();
        assert_eq!(flow.state, "state-1");

        let auth = service
            .complete_auth("?code=abc&state=state-1", "http://localhost/settings")
            .await
            .unwrap();
        assert!(auth.connected);
        assert!(service.status().connected);

        service.disconnect().await.unwrap();
        assert!(!service.status().connected);
        assert_eq!(service.sync(&NoProgress).await, SyncRun::Skipped);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auth_error_in_redirect_is_reported() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        let error = service
            .complete_auth("error=access_denied", "http://localhost/settings")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Auth);
        assert!(!service.remote().calls().contains(&"complete_auth".to_string()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn subscribers_see_completed_sync() {
        let service = connected_service(FakeRemote::connected(), SyncConfig::default()).await;
        let mut receiver = service.subscribe();

        assert!(service.sync(&NoProgress).await.is_completed());

        assert!(receiver.has_changed().unwrap());
        let status = receiver.borrow_and_update().clone();
        assert!(!status.is_syncing);
        assert_eq!(status.last_sync_time, Some(REMOTE_TIMESTAMP));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn open_restores_identity_and_conflicts() {
        let store = MemoryStore::new();
        let identity = SyncIdentity::load_or_create(&store).await.unwrap();
        save_conflicts(
            &store,
            &[ConflictInfo {
                book_id: "b".to_string(),
                field: "progress".to_string(),
                local_value: serde_json::Value::Null,
                remote_value: serde_json::Value::Null,
                resolution: "local".to_string(),
            }],
        )
        .await
        .unwrap();

        let service = SyncService::open(store, FakeRemote::connected(), SyncConfig::default())
            .await
            .unwrap();
        assert_eq!(service.identity().await, identity);
        assert_eq!(service.status().last_conflicts.len(), 1);

        let saved = service
            .save_progress("book", Progress::at_position(&BookStats::default(), 0, 0))
            .await
            .unwrap();
        assert_eq!(saved.device_id, Some(identity.device_id));
    }
}
