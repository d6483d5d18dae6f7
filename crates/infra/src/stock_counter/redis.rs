//! Redis-backed stock counter (shared across process instances).
//!
//! `DECR` is the single atomic operation the whole admission scheme leans on:
//! Redis serializes it, so concurrent callers across processes each observe a
//! distinct post-decrement value. Keys are `seckill:goods:stock:<goods_id>`.
//!
//! The `redis` crate's sync connection is used (one connection per call,
//! matching the rest of the Redis plumbing in this repo); calls are moved off
//! the async runtime onto the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;

use flashsale_core::GoodsId;
use flashsale_seckill::{StockCounter, StoreError};

/// Default key prefix for cached stock values.
const DEFAULT_KEY_PREFIX: &str = "seckill:goods:stock:";

#[derive(Debug, Clone)]
pub struct RedisStockCounter {
    client: Arc<redis::Client>,
    key_prefix: String,
}

impl RedisStockCounter {
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `key_prefix` - key namespace (default: "seckill:goods:stock:")
    pub fn new(redis_url: impl AsRef<str>, key_prefix: Option<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: key_prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        })
    }

    fn key(&self, goods_id: GoodsId) -> String {
        format!("{}{}", self.key_prefix, goods_id)
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut redis::Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = client
                .get_connection()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            op(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Command(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl StockCounter for RedisStockCounter {
    async fn decrement(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        let key = self.key(goods_id);
        self.run_blocking(move |conn| {
            redis::cmd("DECR")
                .arg(&key)
                .query::<i64>(conn)
                .map_err(|e| StoreError::Command(format!("DECR failed: {e}")))
        })
        .await
    }

    async fn get(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        let key = self.key(goods_id);
        self.run_blocking(move |conn| {
            redis::cmd("GET")
                .arg(&key)
                .query::<Option<i64>>(conn)
                .map(|v| v.unwrap_or(0))
                .map_err(|e| StoreError::Command(format!("GET failed: {e}")))
        })
        .await
    }

    async fn set(&self, goods_id: GoodsId, value: i64) -> Result<(), StoreError> {
        let key = self.key(goods_id);
        self.run_blocking(move |conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .query::<()>(conn)
                .map_err(|e| StoreError::Command(format!("SET failed: {e}")))
        })
        .await
    }
}
