//! Redis-backed key-value store
//!
//! One multiplexed connection shared behind a mutex. TTLs map to SETEX,
//! the revoke-all scan maps to cursored SCAN with a MATCH pattern.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use super::{KeyValueStore, StoreError};

/// Networked cache client for the credential and presence key spaces
pub struct RedisStore {
    conn: Arc<Mutex<MultiplexedConnection>>,
}

impl RedisStore {
    /// Connect and verify the cache is reachable
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Backend(format!("invalid cache url: {e}")))?;
        let mut conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("cache connect failed: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(format!("cache ping failed: {e}")))?;

        info!("Connected to cache at {}", url);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.lock().await;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(secs)
                    .arg(value)
                    .query_async::<()>(&mut *conn)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))
            }
            None => redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<()>(&mut *conn)
                .await
                .map_err(|e| StoreError::Backend(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.lock().await;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}
