//! Core types and shared functionality for alpha-sync.
//!
//! This crate provides:
//! - Response cache store with SQLite and in-memory backends
//! - Durable storage for deferred content submissions
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod pending;

pub use cache::{CacheEntry, CacheHandle, CacheName, CacheStore, CacheVersion, LocalDb, RequestKey, StoredResponse};
pub use config::AppConfig;
pub use error::Error;
pub use pending::PendingWrite;
