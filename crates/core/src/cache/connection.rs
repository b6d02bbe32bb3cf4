//! Opening the local SQLite database.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Local database handle.
///
/// Holds both the response caches and the deferred write queue. Wraps a
/// tokio-rusqlite Connection that runs database operations on a background
/// thread, so clones share one connection.
#[derive(Clone, Debug)]
pub struct LocalDb {
    pub(crate) conn: Connection,
}

impl LocalDb {
    /// Open (or create) the database file and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Close the shared connection. Every clone fails afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::Database)
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_close_fails_every_clone() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let clone = db.clone();

        db.close().await.unwrap();

        assert!(matches!(clone.pending_write_count().await, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_open_file_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = LocalDb::open(dir.path().join("sync.sqlite")).await.unwrap();
        let tables: i64 = db
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                     AND name IN ('caches', 'cache_entries', 'pending_writes')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 3);
    }
}
