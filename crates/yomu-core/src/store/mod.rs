//! Local store adapter
//!
//! Every piece of local state lives in one of a few named collections, each a
//! flat key/value map. Records are opaque bytes at this layer; the typed
//! helpers below encode them as JSON, except raw book files which are stored
//! as-is.

mod database;
pub mod library;
mod memory;
mod migrations;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

pub use database::LibSqlStore;
pub use memory::MemoryStore;

/// Named collections of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Reading progress keyed by book id
    Progress,
    /// Book metadata keyed by book id
    Metadata,
    /// Parsed chapter content keyed by book id
    Content,
    /// Raw book archives keyed by book id
    Files,
    /// Categories keyed by category id
    Categories,
    /// Category display preferences keyed by category id
    CategoryMetadata,
    /// Device identity, sync bookkeeping and tombstones
    SyncState,
}

impl Collection {
    /// Collections holding per-book records.
    pub const BOOK_RECORDS: [Self; 4] = [Self::Progress, Self::Metadata, Self::Content, Self::Files];

    /// Stable name used as the storage namespace.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Metadata => "metadata",
            Self::Content => "content",
            Self::Files => "files",
            Self::Categories => "categories",
            Self::CategoryMetadata => "category_metadata",
            Self::SyncState => "sync_state",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Uniform get/set/remove/keys access over the local collections (async)
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Fetch a record, `None` when the key is absent
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite a record
    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a record; removing a missing key is not an error
    async fn remove(&self, collection: Collection, key: &str) -> Result<()>;

    /// List every key in a collection, sorted
    async fn keys(&self, collection: Collection) -> Result<Vec<String>>;
}

impl<S: LocalStore> LocalStore for Arc<S> {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        self.as_ref().get(collection, key).await
    }

    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()> {
        self.as_ref().set(collection, key, value).await
    }

    async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.as_ref().remove(collection, key).await
    }

    async fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        self.as_ref().keys(collection).await
    }
}

/// Fetch and decode a JSON record.
pub async fn get_json<S, T>(store: &S, collection: Collection, key: &str) -> Result<Option<T>>
where
    S: LocalStore,
    T: DeserializeOwned,
{
    match store.get(collection, key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and store a JSON record.
pub async fn set_json<S, T>(store: &S, collection: Collection, key: &str, value: &T) -> Result<()>
where
    S: LocalStore,
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    store.set(collection, key, &bytes).await
}
