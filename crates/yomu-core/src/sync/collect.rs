//! Payload collection

use std::collections::BTreeMap;

use super::progress::{PhaseReporter, ProgressSink, SyncPhase};
use super::selected_collections;
use crate::codec::encode_blob;
use crate::models::{CategorySelection, ParsedContent, SyncPayload};
use crate::store::library::load_deletions;
use crate::store::{Collection, LocalStore};
use crate::Result;

/// Assemble a payload from every enabled local collection.
///
/// Reads only. Any fetch or decode failure aborts the collection; a key that
/// disappears between listing and fetching is skipped.
pub async fn collect<S: LocalStore>(
    store: &S,
    device_id: &str,
    selection: &CategorySelection,
    sink: &dyn ProgressSink,
) -> Result<SyncPayload> {
    let mut plan = Vec::new();
    for collection in selected_collections(selection) {
        plan.push((collection, store.keys(collection).await?));
    }
    let total = plan.iter().map(|(_, keys)| keys.len()).sum();

    let mut reporter = PhaseReporter::new(sink, SyncPhase::Collecting, total);
    reporter.message(format!("Collecting {total} local records"));

    let mut payload = SyncPayload::new(device_id);
    if selection.metadata {
        payload.ln_categories = Some(BTreeMap::new());
        payload.ln_category_metadata = Some(BTreeMap::new());
    }
    if selection.content {
        payload.ln_content = Some(BTreeMap::new());
    }
    if selection.files {
        payload.ln_files = Some(BTreeMap::new());
    }

    for (collection, keys) in plan {
        for key in keys {
            let Some(bytes) = store.get(collection, &key).await? else {
                tracing::debug!(%collection, key, "Record vanished during collection");
                reporter.step(format!("Skipped {collection} {key}"));
                continue;
            };
            let message = format!("Collected {collection} {key}");
            place_record(&mut payload, collection, key, &bytes)?;
            reporter.step(message);
        }
    }

    payload.deletions = load_deletions(store).await?;

    tracing::debug!(
        progress = payload.ln_progress.len(),
        metadata = payload.ln_metadata.len(),
        deletions = payload.deletions.book_ids.len(),
        "Collected sync payload"
    );
    Ok(payload)
}

fn place_record(
    payload: &mut SyncPayload,
    collection: Collection,
    key: String,
    bytes: &[u8],
) -> Result<()> {
    match collection {
        Collection::Progress => {
            payload
                .ln_progress
                .insert(key, serde_json::from_slice(bytes)?);
        }
        Collection::Metadata => {
            payload
                .ln_metadata
                .insert(key, serde_json::from_slice(bytes)?);
        }
        Collection::Content => {
            let content: ParsedContent = serde_json::from_slice(bytes)?;
            payload
                .ln_content
                .get_or_insert_with(BTreeMap::new)
                .insert(key, content.to_payload());
        }
        Collection::Files => {
            payload
                .ln_files
                .get_or_insert_with(BTreeMap::new)
                .insert(key, encode_blob(bytes));
        }
        Collection::Categories => {
            payload
                .ln_categories
                .get_or_insert_with(BTreeMap::new)
                .insert(key, serde_json::from_slice(bytes)?);
        }
        Collection::CategoryMetadata => {
            payload
                .ln_category_metadata
                .get_or_insert_with(BTreeMap::new)
                .insert(key, serde_json::from_slice(bytes)?);
        }
        Collection::SyncState => {}
    }
    Ok(())
}
