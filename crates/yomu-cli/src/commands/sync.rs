use std::path::Path;

use yomu_core::sync::SyncOutcome;
use yomu_core::SyncRun;

use crate::commands::common::{
    connect_service, format_sync_timestamp, open_service, print_progress,
};
use crate::error::CliError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncMode {
    Merge,
    Pull,
    Push,
}

impl SyncMode {
    const fn label(self) -> &'static str {
        match self {
            Self::Merge => "Sync",
            Self::Pull => "Pull",
            Self::Push => "Push",
        }
    }
}

pub async fn run_sync(mode: SyncMode, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path, config_path).await?;
    connect_service(&service).await?;

    let sink = print_progress;
    let run = match mode {
        SyncMode::Merge => service.sync(&sink).await,
        SyncMode::Pull => service.pull_only(&sink).await,
        SyncMode::Push => service.push_only(&sink).await,
    };

    match run {
        SyncRun::Completed(outcome) => {
            for line in format_outcome_lines(mode, &outcome) {
                println!("{line}");
            }
            Ok(())
        }
        SyncRun::Skipped => Err(CliError::SyncSkipped),
        SyncRun::Failed(failure) => Err(CliError::SyncFailed(failure.message)),
    }
}

pub fn format_outcome_lines(mode: SyncMode, outcome: &SyncOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{} completed at {}",
        mode.label(),
        format_sync_timestamp(outcome.sync_timestamp)
    )];

    let applied = &outcome.applied;
    if applied.written() > 0 {
        lines.push(format!(
            "Applied {} progress, {} metadata, {} categories, {} content, {} files",
            applied.progress, applied.metadata, applied.categories, applied.content, applied.files
        ));
    }
    if outcome.files_uploaded > 0 || outcome.files_downloaded > 0 {
        lines.push(format!(
            "Transferred files: {} up, {} down",
            outcome.files_uploaded, outcome.files_downloaded
        ));
    }
    if !applied.deleted.is_empty() {
        lines.push(format!("Removed: {}", applied.deleted.join(", ")));
    }
    if !applied.pending_deletions.is_empty() {
        lines.push(format!(
            "Removed on another device (run `yomu remove <id>` to remove here too): {}",
            applied.pending_deletions.join(", ")
        ));
    }
    if !outcome.conflicts.is_empty() {
        lines.push(format!(
            "{} conflict(s), see `yomu conflicts`",
            outcome.conflicts.len()
        ));
    }
    lines
}
