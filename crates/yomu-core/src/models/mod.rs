//! Data models for Yomu

mod category;
mod conflict;
mod content;
mod metadata;
mod payload;
mod progress;
mod sync_config;

pub use category::{Category, CategoryMetadata};
pub use conflict::ConflictInfo;
pub use content::{ContentPayload, ParsedContent};
pub use metadata::{BlockIndexEntry, BookMetadata, BookStats, TocItem};
pub use payload::{deserialize_versioned, Deletions, SyncPayload, CURRENT_SCHEMA_VERSION};
pub use progress::Progress;
pub use sync_config::{
    CategorySelection, DeletionBehavior, GoogleDriveFolderType, SyncBackendType, SyncConfig,
};
