use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] yomu_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Book ID cannot be empty")]
    EmptyBookId,
    #[error("Book not found: {0}. Open it in a reader first so its metadata exists.")]
    BookNotFound(String),
    #[error("Chapter {chapter} is out of range (book has {chapters} chapters)")]
    ChapterOutOfRange { chapter: usize, chapters: usize },
    #[error("Not connected to a sync backend. Run `yomu auth login` first.")]
    NotConnected,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("A sync is already running")]
    SyncSkipped,
    #[error("No settings given. See `yomu config set --help`.")]
    NothingToSet,
}
