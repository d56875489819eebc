//! Sync configuration model

use serde::{Deserialize, Serialize};

/// Storage provider the sync backend writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncBackendType {
    /// Not connected to any provider
    #[default]
    None,
    /// Google Drive
    GoogleDrive,
}

/// Where the backend keeps the sync file on Google Drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum GoogleDriveFolderType {
    /// Hidden per-app folder
    #[default]
    AppData,
    /// Visible folder in the user's drive
    Public,
}

/// How deletions received from other devices are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeletionBehavior {
    /// Ignore remote deletions; keep local copies
    #[default]
    KeepEverywhere,
    /// Remove the book locally as well
    DeleteEverywhere,
    /// Leave data untouched and report the ids for the user to decide
    AskEachTime,
}

/// Which record categories take part in a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CategorySelection {
    pub progress: bool,
    pub metadata: bool,
    pub content: bool,
    pub files: bool,
}

impl CategorySelection {
    /// Every category enabled.
    pub const ALL: Self = Self {
        progress: true,
        metadata: true,
        content: true,
        files: true,
    };
}

/// Persisted sync settings shared with the sync backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncConfig {
    /// Include reading progress
    pub ln_progress: bool,
    /// Include book metadata and categories
    pub ln_metadata: bool,
    /// Include parsed chapter content and images
    pub ln_content: bool,
    /// Include raw book archives
    pub ln_files: bool,
    pub sync_on_chapter_read: bool,
    pub sync_on_chapter_open: bool,
    pub sync_on_app_start: bool,
    pub sync_on_app_resume: bool,
    pub backend: SyncBackendType,
    pub google_drive_folder: String,
    pub google_drive_folder_type: GoogleDriveFolderType,
    pub deletion_behavior: DeletionBehavior,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ln_progress: true,
            ln_metadata: true,
            ln_content: true,
            ln_files: false,
            sync_on_chapter_read: false,
            sync_on_chapter_open: false,
            sync_on_app_start: false,
            sync_on_app_resume: false,
            backend: SyncBackendType::None,
            google_drive_folder: "Yomu".to_string(),
            google_drive_folder_type: GoogleDriveFolderType::AppData,
            deletion_behavior: DeletionBehavior::KeepEverywhere,
        }
    }
}

impl SyncConfig {
    /// Category inclusion flags for the collector and applier.
    pub const fn selection(&self) -> CategorySelection {
        CategorySelection {
            progress: self.ln_progress,
            metadata: self.ln_metadata,
            content: self.ln_content,
            files: self.ln_files,
        }
    }
}
