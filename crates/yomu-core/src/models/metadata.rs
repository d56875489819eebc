//! Book metadata model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Start of a rendered block inside a chapter.
///
/// Block ids survive re-pagination, so positions anchored to a block can be
/// restored after font or layout changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockIndexEntry {
    pub block_id: String,
    /// Character offset of the block start, chapter-local
    pub start_offset: u64,
}

/// Precomputed character statistics for a book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub chapter_lengths: Vec<u64>,
    pub total_length: u64,
    /// Per-chapter block maps, sorted by `start_offset`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_maps: Option<Vec<Vec<BlockIndexEntry>>>,
}

impl BookStats {
    /// Build stats from chapter lengths, deriving the total.
    ///
    /// A total past `u64::MAX` saturates; `validate` rejects such stats.
    #[must_use]
    pub fn from_chapter_lengths(chapter_lengths: Vec<u64>) -> Self {
        let total_length = checked_sum(&chapter_lengths).unwrap_or(u64::MAX);
        Self {
            chapter_lengths,
            total_length,
            block_maps: None,
        }
    }

    /// Attach per-chapter block maps.
    #[must_use]
    pub fn with_block_maps(mut self, mut block_maps: Vec<Vec<BlockIndexEntry>>) -> Self {
        for blocks in &mut block_maps {
            blocks.sort_by_key(|block| block.start_offset);
        }
        self.block_maps = Some(block_maps);
        self
    }

    /// Check that `total_length` matches the chapter sum.
    pub fn validate(&self) -> Result<()> {
        let sum = checked_sum(&self.chapter_lengths).ok_or_else(|| {
            Error::InvalidInput("stats chapter lengths overflow".to_string())
        })?;
        if sum == self.total_length {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "stats total length {} does not match chapter sum {sum}",
                self.total_length
            )))
        }
    }

    /// Length of a chapter, zero when out of range.
    pub fn chapter_length(&self, chapter_index: usize) -> u64 {
        self.chapter_lengths
            .get(chapter_index)
            .copied()
            .unwrap_or(0)
    }

    /// Number of characters in all chapters before `chapter_index`.
    pub fn chars_before(&self, chapter_index: usize) -> u64 {
        self.chapter_lengths
            .iter()
            .take(chapter_index)
            .fold(0, |total, length| total.saturating_add(*length))
    }

    /// Find the block containing a chapter-local offset.
    ///
    /// Returns the block id and the offset relative to the block start.
    pub fn locate_block(&self, chapter_index: usize, offset: u64) -> Option<(String, u64)> {
        let blocks = self.block_maps.as_ref()?.get(chapter_index)?;
        blocks
            .iter()
            .rev()
            .find(|block| block.start_offset <= offset)
            .map(|block| (block.block_id.clone(), offset - block.start_offset))
    }

    /// Resolve a block-anchored position back to a chapter and chapter-local offset.
    pub fn resolve_block(&self, block_id: &str, local_offset: u64) -> Option<(usize, u64)> {
        self.block_maps
            .as_ref()?
            .iter()
            .enumerate()
            .find_map(|(chapter_index, blocks)| {
                blocks
                    .iter()
                    .find(|block| block.block_id == block_id)
                    .map(|block| (chapter_index, block.start_offset + local_offset))
            })
    }
}

fn checked_sum(lengths: &[u64]) -> Option<u64> {
    lengths
        .iter()
        .try_fold(0_u64, |total, length| total.checked_add(*length))
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocItem {
    pub label: String,
    pub href: String,
    pub chapter_index: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocItem>,
}

/// Imported book metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Import timestamp (Unix ms)
    #[serde(default)]
    pub added_at: i64,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub stats: BookStats,
    #[serde(default)]
    pub toc: Vec<TocItem>,
    /// Reader settings keyed by language code
    #[serde(default)]
    pub language_settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl BookMetadata {
    /// Create metadata for a freshly imported book.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, stats: BookStats) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            title: title.into(),
            author: String::new(),
            cover: None,
            added_at: now,
            is_processing: false,
            is_error: false,
            error_msg: None,
            stats,
            toc: Vec::new(),
            language_settings: BTreeMap::new(),
            category_ids: Vec::new(),
            last_modified: Some(now),
        }
    }
}
