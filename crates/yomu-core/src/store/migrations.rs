//! Local store migrations

use crate::error::Result;
use libsql::Connection;

/// Schema steps in order. Each runs once, inside its own transaction.
const MIGRATIONS: &[(i32, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        value BLOB NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (collection, key)
    );
    CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);",
)];

#[cfg(test)]
const CURRENT_VERSION: i32 = 1;

/// Bring the schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;
    let applied = applied_version(conn).await?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
        let tx = conn.transaction().await?;
        tx.execute_batch(sql).await?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .await?;
        tx.commit().await?;
        tracing::debug!(version, "Applied local store migration");
    }

    Ok(())
}

async fn applied_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}
