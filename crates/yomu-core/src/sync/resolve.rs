//! Local reconciliation of reading progress

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ConflictInfo, Progress};
use crate::store::{get_json, set_json, Collection, LocalStore};
use crate::Result;

const PROGRESS_EPSILON: f64 = 1e-6;

/// Which side of a progress pair should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Local,
    Remote,
    /// Neither side can be ordered; local is kept and the pair reported
    Conflict,
}

/// Decide between a local and a remote progress record.
///
/// Rules, first match wins:
/// 1. no local record: remote
/// 2. either side without `lastModified`: remote only when strictly further along
/// 3. same device: the newer `lastModified`
/// 4. different devices, different `totalProgress`: the further one
/// 5. equal progress: the newer `lastModified`; on a full tie, local when
///    both point at the same place, otherwise a conflict
pub fn resolve_progress(local: Option<&Progress>, remote: &Progress) -> Resolution {
    let Some(local) = local else {
        return Resolution::Remote;
    };

    let (Some(local_modified), Some(remote_modified)) = (local.last_modified, remote.last_modified)
    else {
        return if remote.total_progress - local.total_progress > PROGRESS_EPSILON {
            Resolution::Remote
        } else {
            Resolution::Local
        };
    };

    if same_device(local, remote) {
        return if remote_modified > local_modified {
            Resolution::Remote
        } else {
            Resolution::Local
        };
    }

    if (remote.total_progress - local.total_progress).abs() > PROGRESS_EPSILON {
        return if remote.total_progress > local.total_progress {
            Resolution::Remote
        } else {
            Resolution::Local
        };
    }

    match remote_modified.cmp(&local_modified) {
        Ordering::Greater => Resolution::Remote,
        Ordering::Less => Resolution::Local,
        Ordering::Equal if local.same_position(remote) => Resolution::Local,
        Ordering::Equal => Resolution::Conflict,
    }
}

fn same_device(local: &Progress, remote: &Progress) -> bool {
    matches!(
        (&local.device_id, &remote.device_id),
        (Some(local), Some(remote)) if local == remote
    )
}

/// Outcome of merging remote progress records into the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressMergeReport {
    pub adopted: Vec<String>,
    pub kept: Vec<String>,
    pub conflicts: Vec<ConflictInfo>,
}

/// Merge progress records that arrived outside a full sync.
///
/// Remote records win according to [`resolve_progress`] and are written
/// as-is. Conflicting pairs leave the local record untouched.
pub async fn merge_remote_progress<S: LocalStore>(
    store: &S,
    remote: &BTreeMap<String, Progress>,
) -> Result<ProgressMergeReport> {
    let mut report = ProgressMergeReport::default();

    for (book_id, remote_progress) in remote {
        let local: Option<Progress> = get_json(store, Collection::Progress, book_id).await?;
        match resolve_progress(local.as_ref(), remote_progress) {
            Resolution::Remote => {
                set_json(store, Collection::Progress, book_id, remote_progress).await?;
                report.adopted.push(book_id.clone());
            }
            Resolution::Local => report.kept.push(book_id.clone()),
            Resolution::Conflict => {
                tracing::warn!(book_id, "Progress conflict, keeping local position");
                report.conflicts.push(ConflictInfo {
                    book_id: book_id.clone(),
                    field: "progress".to_string(),
                    local_value: serde_json::to_value(&local)?,
                    remote_value: serde_json::to_value(remote_progress)?,
                    resolution: "local".to_string(),
                });
            }
        }
    }

    Ok(report)
}
