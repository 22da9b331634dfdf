//! Key-value store seam for the credential cache and presence directory
//!
//! Both registries live in one externally shared, fallible cache process.
//! The store is injected behind this trait so tests run against an in-memory
//! map and production runs against Redis without changing call sites.
//!
//! Consistency unit is a single remote key: every mutation is one atomic
//! set/delete. No multi-key transactions are offered, so callers must not
//! assume any ordering across keys.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error from the backing cache process
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation (includes unreachable)
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Injected store interface over a string key space.
///
/// `keys` is a prefix scan and is O(total keys under the prefix); it exists
/// for the credential revoke-all path and nothing else.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read one key; `None` means absent, which is a normal outcome
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Upsert one key, optionally with a store-level expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete one key; deleting an absent key is a no-op, not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
