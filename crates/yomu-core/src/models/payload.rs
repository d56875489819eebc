//! Transportable sync snapshot

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use super::{BookMetadata, Category, CategoryMetadata, ContentPayload, Progress};
use crate::{Error, Result};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Book ids and file references removed locally since the last sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletions {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub book_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub files: BTreeSet<String>,
}

impl Deletions {
    pub fn is_empty(&self) -> bool {
        self.book_ids.is_empty() && self.files.is_empty()
    }

    /// Drop every marker present in `shipped`.
    pub fn remove_all(&mut self, shipped: &Self) {
        self.book_ids.retain(|id| !shipped.book_ids.contains(id));
        self.files.retain(|file| !shipped.files.contains(file));
    }
}

/// Versioned snapshot exchanged with the sync backend.
///
/// Content and file maps are `None` when their category was not collected,
/// which keeps the keys out of the JSON entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub schema_version: u32,
    pub device_id: String,
    /// Assembly time (Unix ms)
    pub timestamp: i64,
    #[serde(default)]
    pub ln_progress: BTreeMap<String, Progress>,
    #[serde(default)]
    pub ln_metadata: BTreeMap<String, BookMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln_content: Option<BTreeMap<String, ContentPayload>>,
    /// Raw book archives as base64
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln_files: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln_categories: Option<BTreeMap<String, Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln_category_metadata: Option<BTreeMap<String, CategoryMetadata>>,
    #[serde(default, skip_serializing_if = "Deletions::is_empty")]
    pub deletions: Deletions,
}

impl SyncPayload {
    /// Empty snapshot stamped with the device id and the current time.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            device_id: device_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            ln_progress: BTreeMap::new(),
            ln_metadata: BTreeMap::new(),
            ln_content: None,
            ln_files: None,
            ln_categories: None,
            ln_category_metadata: None,
            deletions: Deletions::default(),
        }
    }

    /// Parse a snapshot of any supported schema version, upgrading as needed.
    ///
    /// Documents without `schemaVersion` predate versioning and are read as v1.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let version = match value.get("schemaVersion") {
            None | Some(serde_json::Value::Null) => 1,
            Some(raw) => raw
                .as_u64()
                .ok_or_else(|| Error::InvalidInput("schemaVersion must be an integer".to_string()))
                .map(|version| u32::try_from(version).unwrap_or(u32::MAX))?,
        };

        match version {
            1 => Ok(serde_json::from_value::<PayloadV1>(value)?.into()),
            CURRENT_SCHEMA_VERSION => Ok(serde_json::from_value(value)?),
            0 => Err(Error::InvalidInput(
                "schemaVersion 0 is not a valid payload version".to_string(),
            )),
            found => Err(Error::SchemaVersion {
                found,
                supported: CURRENT_SCHEMA_VERSION,
            }),
        }
    }

    /// Parse a snapshot from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Ids of every book referenced by progress, metadata, content, or files.
    pub fn book_ids(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self.ln_progress.keys().map(String::as_str).collect();
        ids.extend(self.ln_metadata.keys().map(String::as_str));
        if let Some(content) = &self.ln_content {
            ids.extend(content.keys().map(String::as_str));
        }
        if let Some(files) = &self.ln_files {
            ids.extend(files.keys().map(String::as_str));
        }
        ids
    }
}

/// First-generation envelope: progress and metadata only, unprefixed keys.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadV1 {
    device_id: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    progress: BTreeMap<String, Progress>,
    #[serde(default)]
    metadata: BTreeMap<String, BookMetadata>,
}

impl From<PayloadV1> for SyncPayload {
    fn from(value: PayloadV1) -> Self {
        Self {
            timestamp: value.timestamp,
            ln_progress: value.progress,
            ln_metadata: value.metadata,
            ..Self::new(value.device_id)
        }
    }
}

/// `deserialize_with` adapter that routes through [`SyncPayload::from_value`].
pub fn deserialize_versioned<'de, D>(deserializer: D) -> std::result::Result<SyncPayload, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    SyncPayload::from_value(value).map_err(serde::de::Error::custom)
}
