//! Sync conflict model

use serde::{Deserialize, Serialize};

/// A field two devices edited in ways that could not be trivially ordered.
///
/// `resolution` names the side the resolver kept (`local`, `remote`, or
/// `conflict` when nothing was overwritten).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub book_id: String,
    pub field: String,
    pub local_value: serde_json::Value,
    pub remote_value: serde_json::Value,
    pub resolution: String,
}
