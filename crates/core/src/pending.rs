//! Durable storage for deferred content submissions.
//!
//! Pending writes live in their own table, outside the response caches, so
//! sweeping stale caches never drops queued user input. Rows are only ever
//! inserted, have their attempt count bumped, or are deleted after a
//! confirmed replay.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use crate::Error;
use crate::cache::LocalDb;

/// One content submission waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub id: String,
    pub payload: serde_json::Value,
    /// Where the write is replayed; `None` means the default submit endpoint.
    pub target_url: Option<String>,
    pub created_at: String,
    pub attempts: u32,
}

const COLUMNS: &str = "id, payload_json, target_url, created_at, attempts";

type PendingRow = (String, String, Option<String>, String, i64);

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_write((id, payload_json, target_url, created_at, attempts): PendingRow) -> Result<PendingWrite, Error> {
    Ok(PendingWrite {
        id,
        payload: serde_json::from_str(&payload_json)?,
        target_url,
        created_at,
        attempts: attempts as u32,
    })
}

impl LocalDb {
    /// Append a pending write with a fresh identifier and zero attempts.
    pub async fn enqueue_write(
        &self, payload: &serde_json::Value, target_url: Option<&str>,
    ) -> Result<PendingWrite, Error> {
        let write = PendingWrite {
            id: uuid::Uuid::now_v7().to_string(),
            payload: payload.clone(),
            target_url: target_url.map(String::from),
            created_at: chrono::Utc::now().to_rfc3339(),
            attempts: 0,
        };
        let payload_json = serde_json::to_string(payload)?;
        let row = (write.id.clone(), write.target_url.clone(), write.created_at.clone());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO pending_writes (id, payload_json, target_url, created_at, attempts)
                     VALUES (?1, ?2, ?3, ?4, 0)",
                    params![row.0, payload_json, row.1, row.2],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(write)
    }

    /// All pending writes in enqueue order.
    pub async fn pending_writes(&self) -> Result<Vec<PendingWrite>, Error> {
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<PendingRow>, Error> {
                let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM pending_writes ORDER BY seq ASC"))?;
                let rows = stmt.query_map([], from_row)?.collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;
        rows.into_iter().map(into_write).collect()
    }

    /// Get a pending write by id.
    pub async fn get_pending_write(&self, id: &str) -> Result<Option<PendingWrite>, Error> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<PendingRow>, Error> {
                let result = conn.query_row(
                    &format!("SELECT {COLUMNS} FROM pending_writes WHERE id = ?1"),
                    params![id],
                    from_row,
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;
        row.map(into_write).transpose()
    }

    /// Delete a pending write after a confirmed replay. Returns whether it existed.
    pub async fn remove_pending_write(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM pending_writes WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Bump the attempt count of a pending write. Returns the new count, or
    /// `None` if the write no longer exists.
    pub async fn record_write_attempt(&self, id: &str) -> Result<Option<u32>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<u32>, Error> {
                let updated = conn.execute(
                    "UPDATE pending_writes SET attempts = attempts + 1 WHERE id = ?1",
                    params![id],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let attempts: i64 =
                    conn.query_row("SELECT attempts FROM pending_writes WHERE id = ?1", params![id], |row| row.get(0))?;
                Ok(Some(attempts as u32))
            })
            .await
            .map_err(Error::from)
    }

    /// Number of pending writes.
    pub async fn pending_write_count(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_writes", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
