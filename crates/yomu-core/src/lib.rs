//! yomu-core - Reading-state sync for Yomu
//!
//! This crate holds the book models, the local store adapter, and the sync
//! pipeline (collect, merge, apply) shared by every Yomu host.

pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result};
pub use identity::SyncIdentity;
pub use models::{BookMetadata, Progress, SyncConfig, SyncPayload};
pub use state::{SyncFailure, SyncState, SyncStatus};
pub use store::{Collection, LibSqlStore, LocalStore, MemoryStore};
pub use sync::{HttpSyncClient, SyncRemote, SyncRun, SyncService};
