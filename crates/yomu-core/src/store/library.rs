//! Typed helpers for the book records a reader mutates locally
//!
//! These are the only writers that stamp sync bookkeeping. Records written by
//! the applier arrive already stamped by whichever device produced them.

use super::{get_json, set_json, Collection, LocalStore};
use crate::models::{BookMetadata, Deletions, ParsedContent, Progress};
use crate::util::unix_millis_now;
use crate::{Error, Result};

/// Key of the pending tombstones inside [`Collection::SyncState`].
pub const DELETIONS_KEY: &str = "deletions";

/// Load the stored progress for a book.
pub async fn get_progress<S: LocalStore>(store: &S, book_id: &str) -> Result<Option<Progress>> {
    get_json(store, Collection::Progress, book_id).await
}

/// Persist a reading position, stamping it for sync.
///
/// `syncVersion` always ends up above both the stored and the supplied value,
/// and `lastModified` never moves backwards for the same book.
pub async fn save_progress<S: LocalStore>(
    store: &S,
    book_id: &str,
    device_id: &str,
    mut progress: Progress,
) -> Result<Progress> {
    ensure_book_id(book_id)?;
    let previous = get_progress(store, book_id).await?;

    let previous_version = previous.as_ref().map_or(0, |stored| stored.sync_version);
    let previous_modified = previous
        .as_ref()
        .and_then(|stored| stored.last_modified)
        .unwrap_or(i64::MIN);
    let now = unix_millis_now().max(previous_modified.saturating_add(1));

    progress.clamp_percentages();
    progress.sync_version = previous_version
        .max(progress.sync_version)
        .checked_add(1)
        .ok_or_else(|| {
            Error::InvalidInput(format!("sync version of '{book_id}' cannot advance"))
        })?;
    progress.last_modified = Some(now);
    progress.last_read = Some(now);
    progress.device_id = Some(device_id.to_string());

    set_json(store, Collection::Progress, book_id, &progress).await?;
    forget_deletion(store, book_id, false).await?;
    tracing::debug!(
        book_id,
        sync_version = progress.sync_version,
        "Saved reading progress"
    );
    Ok(progress)
}

/// Load the stored metadata for a book.
pub async fn get_metadata<S: LocalStore>(
    store: &S,
    book_id: &str,
) -> Result<Option<BookMetadata>> {
    get_json(store, Collection::Metadata, book_id).await
}

/// Persist book metadata after checking its stats.
pub async fn save_metadata<S: LocalStore>(
    store: &S,
    mut metadata: BookMetadata,
) -> Result<BookMetadata> {
    ensure_book_id(&metadata.id)?;
    metadata.stats.validate()?;
    metadata.last_modified = Some(unix_millis_now());
    set_json(store, Collection::Metadata, &metadata.id, &metadata).await?;
    forget_deletion(store, &metadata.id, false).await?;
    Ok(metadata)
}

/// Persist parsed chapter content.
pub async fn save_content<S: LocalStore>(
    store: &S,
    book_id: &str,
    content: &ParsedContent,
) -> Result<()> {
    ensure_book_id(book_id)?;
    set_json(store, Collection::Content, book_id, content).await?;
    forget_deletion(store, book_id, false).await
}

/// Persist the original book archive.
pub async fn save_file<S: LocalStore>(store: &S, book_id: &str, bytes: &[u8]) -> Result<()> {
    ensure_book_id(book_id)?;
    store.set(Collection::Files, book_id, bytes).await?;
    forget_deletion(store, book_id, true).await
}

/// Remove every record of a book and remember the removal for the next sync.
pub async fn remove_book<S: LocalStore>(store: &S, book_id: &str) -> Result<()> {
    ensure_book_id(book_id)?;
    let had_file = store.get(Collection::Files, book_id).await?.is_some();

    for collection in Collection::BOOK_RECORDS {
        store.remove(collection, book_id).await?;
    }

    let mut deletions = load_deletions(store).await?;
    deletions.book_ids.insert(book_id.to_string());
    if had_file {
        deletions.files.insert(book_id.to_string());
    }
    set_json(store, Collection::SyncState, DELETIONS_KEY, &deletions).await?;

    tracing::info!(book_id, "Removed book");
    Ok(())
}

/// Tombstones recorded since the last successful sync.
pub async fn load_deletions<S: LocalStore>(store: &S) -> Result<Deletions> {
    Ok(get_json(store, Collection::SyncState, DELETIONS_KEY)
        .await?
        .unwrap_or_default())
}

/// Forget tombstones that were shipped to the backend.
///
/// Markers added while the sync was in flight are kept.
pub async fn clear_deletions<S: LocalStore>(store: &S, shipped: &Deletions) -> Result<()> {
    if shipped.is_empty() {
        return Ok(());
    }
    let mut pending = load_deletions(store).await?;
    pending.remove_all(shipped);
    if pending.is_empty() {
        store.remove(Collection::SyncState, DELETIONS_KEY).await
    } else {
        set_json(store, Collection::SyncState, DELETIONS_KEY, &pending).await
    }
}

/// Drop a pending removal marker for a book that was written again.
///
/// The file marker is only dropped when the archive itself was rewritten.
async fn forget_deletion<S: LocalStore>(
    store: &S,
    book_id: &str,
    file_written: bool,
) -> Result<()> {
    let mut pending = load_deletions(store).await?;
    let dropped_book = pending.book_ids.remove(book_id);
    let dropped_file = file_written && pending.files.remove(book_id);
    if !dropped_book && !dropped_file {
        return Ok(());
    }
    tracing::debug!(book_id, "Book written again; dropped its removal marker");
    if pending.is_empty() {
        store.remove(Collection::SyncState, DELETIONS_KEY).await
    } else {
        set_json(store, Collection::SyncState, DELETIONS_KEY, &pending).await
    }
}

fn ensure_book_id(book_id: &str) -> Result<()> {
    if book_id.trim().is_empty() {
        return Err(Error::InvalidInput("book id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookStats;
    use crate::store::MemoryStore;

    #[tokio::test(flavor = "current_thread")]
    async fn save_progress_strictly_increases_sync_version() {
        let store = MemoryStore::new();
        let stats = BookStats::from_chapter_lengths(vec![100, 100]);

        let mut last_version = 0;
        let mut last_modified = i64::MIN;
        for offset in [10, 20, 20, 5] {
            let progress = Progress::at_position(&stats, 0, offset);
            let saved = save_progress(&store, "book", "device-a", progress)
                .await
                .unwrap();
            assert!(saved.sync_version > last_version);
            let modified = saved.last_modified.unwrap();
            assert!(modified > last_modified);
            last_version = saved.sync_version;
            last_modified = modified;
        }

        let stored = get_progress(&store, "book").await.unwrap().unwrap();
        assert_eq!(stored.sync_version, 4);
        assert_eq!(stored.device_id.as_deref(), Some("device-a"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn save_progress_stays_above_incoming_version() {
        let store = MemoryStore::new();
        let incoming = Progress {
            sync_version: 41,
            total_progress: 250.0,
            ..Progress::default()
        };
        let saved = save_progress(&store, "book", "device-a", incoming).await.unwrap();
        assert_eq!(saved.sync_version, 42);
        assert!((saved.total_progress - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn save_metadata_rejects_inconsistent_stats() {
        let store = MemoryStore::new();
        let metadata = BookMetadata::new(
            "book",
            "Title",
            BookStats {
                chapter_lengths: vec![10, 10],
                total_length: 25,
                block_maps: None,
            },
        );
        assert!(matches!(
            save_metadata(&store, metadata).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(get_metadata(&store, "book").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_book_records_tombstones() {
        let store = MemoryStore::new();
        save_metadata(&store, BookMetadata::new("book", "Title", BookStats::default()))
            .await
            .unwrap();
        save_file(&store, "book", b"PK\x03\x04").await.unwrap();
        save_metadata(&store, BookMetadata::new("other", "Other", BookStats::default()))
            .await
            .unwrap();

        remove_book(&store, "book").await.unwrap();
        remove_book(&store, "other").await.unwrap();

        assert!(get_metadata(&store, "book").await.unwrap().is_none());
        assert!(store.get(Collection::Files, "book").await.unwrap().is_none());

        let deletions = load_deletions(&store).await.unwrap();
        assert_eq!(deletions.book_ids.len(), 2);
        assert!(deletions.files.contains("book"));
        assert!(!deletions.files.contains("other"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn clear_deletions_keeps_newer_markers() {
        let store = MemoryStore::new();
        remove_book(&store, "a").await.unwrap();
        let shipped = load_deletions(&store).await.unwrap();
        remove_book(&store, "b").await.unwrap();

        clear_deletions(&store, &shipped).await.unwrap();
        let pending = load_deletions(&store).await.unwrap();
        assert_eq!(pending.book_ids.into_iter().collect::<Vec<_>>(), vec!["b"]);

        let shipped = load_deletions(&store).await.unwrap();
        clear_deletions(&store, &shipped).await.unwrap();
        assert!(store
            .get(Collection::SyncState, DELETIONS_KEY)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn writing_a_removed_book_again_drops_its_marker() {
        let store = MemoryStore::new();
        save_file(&store, "book", b"PK").await.unwrap();
        remove_book(&store, "book").await.unwrap();
        remove_book(&store, "other").await.unwrap();

        save_progress(&store, "book", "device-a", Progress::default())
            .await
            .unwrap();
        let pending = load_deletions(&store).await.unwrap();
        assert!(!pending.book_ids.contains("book"));
        assert!(pending.book_ids.contains("other"));
        assert!(pending.files.contains("book"));

        save_file(&store, "book", b"PK").await.unwrap();
        assert!(!load_deletions(&store).await.unwrap().files.contains("book"));

        save_metadata(&store, BookMetadata::new("other", "Other", BookStats::default()))
            .await
            .unwrap();
        assert!(store
            .get(Collection::SyncState, DELETIONS_KEY)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn save_progress_rejects_exhausted_sync_version() {
        let store = MemoryStore::new();
        let incoming = Progress {
            sync_version: u64::MAX,
            ..Progress::default()
        };
        assert!(matches!(
            save_progress(&store, "book", "device-a", incoming).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(get_progress(&store, "book").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_book_id_is_rejected() {
        let store = MemoryStore::new();
        assert!(save_file(&store, "  ", b"x").await.is_err());
    }
}
