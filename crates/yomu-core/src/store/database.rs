//! libSQL-backed local store

use std::path::Path;

use libsql::{Builder, Connection, Database, Value};

use super::{migrations, Collection, LocalStore};
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Local store persisted in a single libSQL file.
pub struct LibSqlStore {
    _db: Database,
    conn: Connection,
}

impl LibSqlStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_database(db).await
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect()?;
        let store = Self { _db: db, conn };
        store.configure().await?;
        migrations::run(&store.conn).await?;
        Ok(store)
    }

    async fn configure(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        Ok(())
    }
}

impl LocalStore for LibSqlStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM records WHERE collection = ? AND key = ?",
                [collection.name(), key],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        match row.get_value(0)? {
            Value::Blob(bytes) => Ok(Some(bytes)),
            Value::Text(text) => Ok(Some(text.into_bytes())),
            other => Err(Error::Storage(format!(
                "unexpected value type in {collection}/{key}: {other:?}"
            ))),
        }
    }

    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO records (collection, key, value, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(collection, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                vec![
                    Value::Text(collection.name().to_string()),
                    Value::Text(key.to_string()),
                    Value::Blob(value.to_vec()),
                    Value::Integer(unix_millis_now()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND key = ?",
                [collection.name(), key],
            )
            .await?;
        Ok(())
    }

    async fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key FROM records WHERE collection = ? ORDER BY key",
                [collection.name()],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }
}
