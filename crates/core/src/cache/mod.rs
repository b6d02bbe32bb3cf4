//! Request-keyed response caches.
//!
//! This module provides the cache store capability used by the fetch
//! strategies, plus its backends:
//!
//! - A persistent SQLite store with async access via tokio-rusqlite
//! - An in-memory store for tests and ephemeral runs
//! - Versioned cache naming so stale deployments can be swept

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod names;
pub mod store;

pub use crate::Error;

pub use connection::LocalDb;
pub use entries::{CacheEntry, RequestKey, StoredResponse};
pub use memory::MemoryCacheStore;
pub use names::{CacheName, CacheVersion};
pub use store::{CacheHandle, CacheStore};
