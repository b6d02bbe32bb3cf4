//! The cache store capability and its SQLite implementation.
//!
//! Strategies never hold a global cache reference; they receive a
//! [`CacheHandle`] opened from whatever [`CacheStore`] the host injects.

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use super::connection::LocalDb;
use super::entries::{CacheEntry, RequestKey, StoredResponse};
use crate::Error;

/// Named, request-keyed response caches.
///
/// At most one entry exists per key per cache; `put` overwrites. Putting an
/// identical key and value again has no observable effect on lookups.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the named cache if it does not exist.
    async fn open(&self, cache: &str) -> Result<(), Error>;

    /// Look up the entry stored under `key`.
    async fn match_key(&self, cache: &str, key: &RequestKey) -> Result<Option<CacheEntry>, Error>;

    /// Store a response, creating the cache if needed.
    async fn put(&self, cache: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error>;

    /// Store a batch of responses atomically: either all become visible or none do.
    async fn put_all(&self, cache: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error>;

    /// Keys of a cache in insertion order.
    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, Error>;

    /// Names of all existing caches.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Drop a cache and all of its entries. Returns whether it existed.
    async fn delete(&self, cache: &str) -> Result<bool, Error>;
}

/// A store bound to one cache name.
#[derive(Clone, Copy)]
pub struct CacheHandle<'a> {
    store: &'a dyn CacheStore,
    name: &'a str,
}

impl<'a> CacheHandle<'a> {
    /// Open (creating if needed) the named cache.
    pub async fn open(store: &'a dyn CacheStore, name: &'a str) -> Result<Self, Error> {
        store.open(name).await?;
        Ok(Self { store, name })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn match_key(&self, key: &RequestKey) -> Result<Option<CacheEntry>, Error> {
        self.store.match_key(self.name, key).await
    }

    pub async fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        self.store.put(self.name, key, response).await
    }

    pub async fn put_all(&self, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        self.store.put_all(self.name, entries).await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        self.store.keys(self.name).await
    }
}

fn ensure_cache(conn: &rusqlite::Connection, cache: &str, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![cache, now],
    )?;
    Ok(())
}

fn upsert_entry(
    conn: &rusqlite::Connection, cache: &str, key: &RequestKey, response: &StoredResponse, now: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO cache_entries (
            cache_name, key, method, url, status, headers_json, body, inserted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(cache_name, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            inserted_at = excluded.inserted_at",
        params![
            cache,
            key.hash(),
            &key.method,
            &key.url,
            response.status as i64,
            headers_json,
            &response.body,
            now,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStore for LocalDb {
    async fn open(&self, cache: &str) -> Result<(), Error> {
        let cache = cache.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_cache(conn, &cache, &now) })
            .await
            .map_err(Error::from)
    }

    async fn match_key(&self, cache: &str, key: &RequestKey) -> Result<Option<CacheEntry>, Error> {
        let cache = cache.to_string();
        let hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let result = conn.query_row(
                    "SELECT method, url, status, headers_json, body, inserted_at
                     FROM cache_entries WHERE cache_name = ?1 AND key = ?2",
                    params![cache, hash],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Vec<u8>>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                );

                match result {
                    Ok((method, url, status, headers_json, body, inserted_at)) => Ok(Some(CacheEntry {
                        key: RequestKey { method, url },
                        response: StoredResponse {
                            status: status as u16,
                            headers: serde_json::from_str(&headers_json)?,
                            body,
                        },
                        inserted_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, cache: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let cache = cache.to_string();
        let key = key.clone();
        let response = response.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &cache, &now)?;
                upsert_entry(conn, &cache, &key, &response, &now)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, cache: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let cache = cache.to_string();
        let entries = entries.to_vec();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &cache, &now)?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &cache, key, response, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url FROM cache_entries
                     WHERE cache_name = ?1 ORDER BY inserted_at ASC, rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![cache], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, cache: &str) -> Result<bool, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![cache])?;
                let count = tx.execute("DELETE FROM caches WHERE name = ?1", params![cache])?;
                tx.commit()?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
