//! Sync pipeline: collect local records, merge them remotely, apply the result.

mod apply;
pub mod auth;
mod client;
mod collect;
mod progress;
mod resolve;
mod service;

pub use apply::{apply, ApplyReport};
pub use auth::{parse_auth_return, AuthFlow, AuthReturn, AuthStatus};
pub use client::{HttpSyncClient, MergeOutcome, PushOutcome, SyncRemote};
pub use collect::collect;
pub use progress::{ChannelProgress, NoProgress, ProgressSink, SyncPhase, SyncProgress};
pub use resolve::{merge_remote_progress, resolve_progress, ProgressMergeReport, Resolution};
pub use service::{SyncOutcome, SyncRun, SyncService, SyncTrigger};

use crate::models::CategorySelection;
use crate::store::Collection;

/// Local collections covered by a category selection, in collection order.
///
/// Categories and their display preferences travel with metadata.
pub(crate) fn selected_collections(selection: &CategorySelection) -> Vec<Collection> {
    let mut collections = Vec::with_capacity(6);
    if selection.progress {
        collections.push(Collection::Progress);
    }
    if selection.metadata {
        collections.extend([
            Collection::Metadata,
            Collection::Categories,
            Collection::CategoryMetadata,
        ]);
    }
    if selection.content {
        collections.push(Collection::Content);
    }
    if selection.files {
        collections.push(Collection::Files);
    }
    collections
}
