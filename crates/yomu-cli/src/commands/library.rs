use std::path::Path;

use yomu_core::models::BookStats;
use yomu_core::store::library::get_metadata;
use yomu_core::Progress;

use crate::commands::common::{normalize_book_id, open_service};
use crate::error::CliError;

pub async fn run_progress(
    book_id: &str,
    chapter: usize,
    offset: u64,
    snippet: Option<&str>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let book_id = normalize_book_id(book_id)?;
    let service = open_service(db_path, config_path).await?;
    let metadata = get_metadata(service.store(), &book_id)
        .await?
        .ok_or_else(|| CliError::BookNotFound(book_id.clone()))?;

    let progress = position_for(&metadata.stats, chapter, offset, snippet)?;
    let saved = service.save_progress(&book_id, progress).await?;
    println!(
        "{}: chapter {} at {:.1}% ({:.1}% of book)",
        metadata.title,
        saved.chapter_index + 1,
        saved.chapter_progress,
        saved.total_progress
    );
    Ok(())
}

/// Build the progress record for a position, rejecting chapters the book lacks.
pub fn position_for(
    stats: &BookStats,
    chapter: usize,
    offset: u64,
    snippet: Option<&str>,
) -> Result<Progress, CliError> {
    let chapters = stats.chapter_lengths.len();
    if chapter >= chapters {
        return Err(CliError::ChapterOutOfRange { chapter, chapters });
    }
    let progress = Progress::at_position(stats, chapter, offset);
    Ok(match snippet.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => progress.with_context(text),
        None => progress,
    })
}

pub async fn run_remove(book_id: &str, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let book_id = normalize_book_id(book_id)?;
    let service = open_service(db_path, config_path).await?;
    service.remove_book(&book_id).await?;
    println!("Removed {book_id}; the removal ships with the next sync");
    Ok(())
}
