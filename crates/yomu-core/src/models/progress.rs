//! Reading progress model

use serde::{Deserialize, Serialize};

use super::BookStats;

/// Reading position for one book, with sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub chapter_index: usize,
    /// Character offset inside the current chapter
    pub chapter_char_offset: u64,
    /// Characters read across the whole book
    pub total_chars_read: u64,
    /// Percentage of the current chapter, 0-100
    pub chapter_progress: f64,
    /// Percentage of the whole book, 0-100
    pub total_progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_local_offset: Option<u64>,
    /// Text around the position, shown when resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_snippet: Option<String>,
    /// Last time the book was opened (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read: Option<i64>,
    /// Last local save (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    /// Incremented on every local save
    #[serde(default)]
    pub sync_version: u64,
    /// Device that produced this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Progress {
    /// Compute a progress record for a chapter-local position.
    ///
    /// `total_chars_read` is the length of all previous chapters plus the
    /// chapter offset, clamped at the book length. Percentages are clamped to
    /// `0..=100`. Block anchoring is filled in when the stats carry block maps.
    #[must_use]
    pub fn at_position(stats: &BookStats, chapter_index: usize, chapter_char_offset: u64) -> Self {
        let chapter_length = stats.chapter_length(chapter_index);
        let total_chars_read = stats
            .chars_before(chapter_index)
            .saturating_add(chapter_char_offset)
            .min(stats.total_length);

        let (block_id, block_local_offset) = stats
            .locate_block(chapter_index, chapter_char_offset)
            .map_or((None, None), |(id, offset)| (Some(id), Some(offset)));

        Self {
            chapter_index,
            chapter_char_offset,
            total_chars_read,
            chapter_progress: percent(chapter_char_offset, chapter_length),
            total_progress: percent(total_chars_read, stats.total_length),
            block_id,
            block_local_offset,
            ..Self::default()
        }
    }

    /// Attach the context snippet shown when resuming.
    #[must_use]
    pub fn with_context(mut self, snippet: impl Into<String>) -> Self {
        self.context_snippet = Some(snippet.into());
        self
    }

    /// Clamp percentages into `0..=100`, mapping NaN to zero.
    pub fn clamp_percentages(&mut self) {
        self.chapter_progress = clamp_percent(self.chapter_progress);
        self.total_progress = clamp_percent(self.total_progress);
    }

    /// Whether both records point at the same place in the book.
    pub fn same_position(&self, other: &Self) -> bool {
        self.chapter_index == other.chapter_index
            && self.chapter_char_offset == other.chapter_char_offset
            && self.block_id == other.block_id
            && self.block_local_offset == other.block_local_offset
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    clamp_percent(part as f64 / whole as f64 * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
