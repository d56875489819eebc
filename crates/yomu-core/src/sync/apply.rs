//! Payload application

use std::collections::BTreeSet;

use super::progress::{PhaseReporter, ProgressSink, SyncPhase};
use crate::codec::decode_blob;
use crate::models::{CategorySelection, DeletionBehavior, SyncPayload};
use crate::store::{set_json, Collection, LocalStore};
use crate::Result;

/// What an apply pass wrote and removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub progress: usize,
    pub metadata: usize,
    pub categories: usize,
    pub content: usize,
    pub files: usize,
    /// Book ids removed because of incoming deletion markers
    pub deleted: Vec<String>,
    /// Book ids the user still has to decide on
    pub pending_deletions: Vec<String>,
}

impl ApplyReport {
    pub const fn written(&self) -> usize {
        self.progress + self.metadata + self.categories + self.content + self.files
    }
}

/// Write a payload into the local store, overwriting by key.
///
/// Only enabled categories are touched. Applying the same payload twice leaves
/// the store as after the first pass. Failures stop the pass where they occur;
/// categories already written stay written.
pub async fn apply<S: LocalStore>(
    store: &S,
    payload: &SyncPayload,
    selection: &CategorySelection,
    deletion_behavior: DeletionBehavior,
    sink: &dyn ProgressSink,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    let doomed: BTreeSet<&str> = match deletion_behavior {
        DeletionBehavior::DeleteEverywhere => payload
            .deletions
            .book_ids
            .iter()
            .map(String::as_str)
            .collect(),
        DeletionBehavior::AskEachTime => {
            report.pending_deletions = payload.deletions.book_ids.iter().cloned().collect();
            BTreeSet::new()
        }
        DeletionBehavior::KeepEverywhere => BTreeSet::new(),
    };
    let keep = |id: &String| !doomed.contains(id.as_str());

    let content = payload.ln_content.as_ref().filter(|_| selection.content);
    let files = payload.ln_files.as_ref().filter(|_| selection.files);
    let categories = payload.ln_categories.as_ref().filter(|_| selection.metadata);
    let category_metadata = payload
        .ln_category_metadata
        .as_ref()
        .filter(|_| selection.metadata);

    let total = [
        selection.progress.then(|| payload.ln_progress.keys().filter(|id| keep(id)).count()),
        selection.metadata.then(|| payload.ln_metadata.keys().filter(|id| keep(id)).count()),
        categories.map(|map| map.len()),
        category_metadata.map(|map| map.len()),
        content.map(|map| map.keys().filter(|id| keep(id)).count()),
        files.map(|map| map.keys().filter(|id| keep(id)).count()),
    ]
    .into_iter()
    .flatten()
    .sum();

    let mut reporter = PhaseReporter::new(sink, SyncPhase::Applying, total);
    reporter.message(format!("Applying {total} records"));

    if selection.progress {
        for (id, progress) in payload.ln_progress.iter().filter(|(id, _)| keep(id)) {
            set_json(store, Collection::Progress, id, progress).await?;
            report.progress += 1;
            reporter.step(format!("Applied progress {id}"));
        }
    }

    if selection.metadata {
        for (id, metadata) in payload.ln_metadata.iter().filter(|(id, _)| keep(id)) {
            set_json(store, Collection::Metadata, id, metadata).await?;
            report.metadata += 1;
            reporter.step(format!("Applied metadata {id}"));
        }
    }

    for (id, category) in categories.into_iter().flatten() {
        set_json(store, Collection::Categories, id, category).await?;
        report.categories += 1;
        reporter.step(format!("Applied category {id}"));
    }

    for (id, preferences) in category_metadata.into_iter().flatten() {
        set_json(store, Collection::CategoryMetadata, id, preferences).await?;
        report.categories += 1;
        reporter.step(format!("Applied category settings {id}"));
    }

    for (id, chapters) in content.into_iter().flatten().filter(|(id, _)| keep(id)) {
        let parsed = chapters.to_parsed()?;
        set_json(store, Collection::Content, id, &parsed).await?;
        report.content += 1;
        reporter.step(format!("Applied content {id}"));
    }

    for (id, encoded) in files.into_iter().flatten().filter(|(id, _)| keep(id)) {
        let bytes = decode_blob(encoded)?;
        store.set(Collection::Files, id, &bytes).await?;
        report.files += 1;
        reporter.step(format!("Applied file {id}"));
    }

    if !doomed.is_empty() {
        remove_books(store, &doomed, selection).await?;
        report.deleted = doomed.iter().map(|id| (*id).to_string()).collect();
    }
    if deletion_behavior == DeletionBehavior::DeleteEverywhere && selection.files {
        for file in &payload.deletions.files {
            store.remove(Collection::Files, file).await?;
        }
    }

    tracing::debug!(
        written = report.written(),
        deleted = report.deleted.len(),
        pending = report.pending_deletions.len(),
        "Applied sync payload"
    );
    Ok(report)
}

async fn remove_books<S: LocalStore>(
    store: &S,
    book_ids: &BTreeSet<&str>,
    selection: &CategorySelection,
) -> Result<()> {
    let collections = [
        (selection.progress, Collection::Progress),
        (selection.metadata, Collection::Metadata),
        (selection.content, Collection::Content),
        (selection.files, Collection::Files),
    ];
    for id in book_ids {
        for (enabled, collection) in collections {
            if enabled {
                store.remove(collection, id).await?;
            }
        }
    }
    Ok(())
}
