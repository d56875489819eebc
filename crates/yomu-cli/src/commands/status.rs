use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use yomu_core::store::library::load_deletions;
use yomu_core::sync::AuthStatus;

use crate::commands::common::{format_last_sync, open_service};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub device_id: String,
    pub api_base_url: String,
    pub last_sync_time: Option<i64>,
    pub pending_deletions: usize,
    pub last_conflicts: usize,
    pub backend: Option<AuthStatus>,
    pub backend_error: Option<String>,
}

pub async fn run_status(as_json: bool, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path, config_path).await?;
    let identity = service.identity().await;
    let deletions = load_deletions(service.store()).await?;

    let (backend, backend_error) = match service.refresh_status().await {
        Ok(auth) => (Some(auth), None),
        Err(error) => (None, Some(error.to_string())),
    };

    let report = StatusReport {
        device_id: identity.device_id,
        api_base_url: service.remote().base_url().to_string(),
        last_sync_time: identity.last_sync_time,
        pending_deletions: deletions.book_ids.len(),
        last_conflicts: service.status().last_conflicts.len(),
        backend,
        backend_error,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport, now_ms: i64) -> Vec<String> {
    let connection = match (&report.backend, &report.backend_error) {
        (Some(auth), _) if auth.connected => auth.email.as_deref().map_or_else(
            || format!("connected ({:?})", auth.backend),
            |email| format!("connected ({:?}, {email})", auth.backend),
        ),
        (Some(_), _) => "not connected".to_string(),
        (None, Some(error)) => format!("unreachable: {error}"),
        (None, None) => "unknown".to_string(),
    };

    vec![
        format!("Device:     {}", report.device_id),
        format!("Backend:    {} ({connection})", report.api_base_url),
        format!(
            "Last sync:  {}",
            format_last_sync(report.last_sync_time, now_ms)
        ),
        format!("Pending removals: {}", report.pending_deletions),
        format!("Conflicts from last sync: {}", report.last_conflicts),
    ]
}
