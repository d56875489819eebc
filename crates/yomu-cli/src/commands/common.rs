use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use yomu_core::models::ConflictInfo;
use yomu_core::sync::SyncProgress;
use yomu_core::{ClientConfig, HttpSyncClient, LibSqlStore, SyncConfig, SyncService};

use crate::error::CliError;

pub type CliService = SyncService<LibSqlStore, HttpSyncClient>;

/// `--json` row for a conflict. Keys are snake_case like the rest of the CLI
/// output, unlike the camelCase wire form of [`ConflictInfo`].
#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub book_id: String,
    pub field: String,
    pub local_value: serde_json::Value,
    pub remote_value: serde_json::Value,
    pub resolution: String,
}

impl From<&ConflictInfo> for ConflictItem {
    fn from(conflict: &ConflictInfo) -> Self {
        Self {
            book_id: conflict.book_id.clone(),
            field: conflict.field.clone(),
            local_value: conflict.local_value.clone(),
            remote_value: conflict.remote_value.clone(),
            resolution: conflict.resolution.clone(),
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("YOMU_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yomu")
        .join("library.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("YOMU_CONFIG_PATH").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yomu")
        .join("client.json")
}

pub fn load_client_config(config_path: &Path) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::load(Some(config_path))?)
}

/// Open the local library and a client for the configured backend.
///
/// The synced preferences start at their defaults; commands that sync fetch
/// the stored ones from the backend first.
pub async fn open_service(db_path: &Path, config_path: &Path) -> Result<CliService, CliError> {
    let client_config = load_client_config(config_path)?;
    let store = LibSqlStore::open(db_path).await?;
    let remote = HttpSyncClient::new(&client_config)?;
    tracing::debug!(db = %db_path.display(), api = remote.base_url(), "Opened sync service");
    Ok(SyncService::open(store, remote, SyncConfig::default()).await?)
}

/// Confirm the backend is connected and pull its preferences.
pub async fn connect_service(service: &CliService) -> Result<(), CliError> {
    let auth = service.refresh_status().await?;
    if !auth.connected {
        return Err(CliError::NotConnected);
    }
    if let Err(error) = service.load_config().await {
        tracing::warn!("Using default sync config: {error}");
    }
    Ok(())
}

pub fn print_progress(progress: SyncProgress) {
    match progress.percent {
        Some(percent) => eprintln!("[{:>3.0}%] {}: {}", percent, progress.phase, progress.message),
        None => eprintln!("       {}: {}", progress.phase, progress.message),
    }
}

pub fn normalize_book_id(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyBookId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn format_conflict_lines(conflicts: &[ConflictInfo]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{:<8}  book={}  field={}  local={} remote={}",
                conflict.resolution,
                conflict.book_id,
                conflict.field,
                conflict.local_value,
                conflict.remote_value
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_last_sync(last_sync: Option<i64>, now_ms: i64) -> String {
    last_sync.map_or_else(
        || "never".to_string(),
        |timestamp| {
            format!(
                "{} ({})",
                format_sync_timestamp(timestamp),
                format_relative_time(timestamp, now_ms)
            )
        },
    )
}
