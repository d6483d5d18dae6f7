//! In-memory stock counter for tests/dev.

use async_trait::async_trait;
use dashmap::DashMap;

use flashsale_core::GoodsId;
use flashsale_seckill::{StockCounter, StoreError};

/// Sharded in-memory counter.
///
/// Decrements are atomic per key: the map's shard lock is held for the whole
/// read-modify-write. Matches Redis `DECR`/`GET` semantics for missing keys
/// (`DECR` yields `-1`, `GET` reads `0`).
#[derive(Debug, Default)]
pub struct InMemoryStockCounter {
    values: DashMap<GoodsId, i64>,
}

impl InMemoryStockCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockCounter for InMemoryStockCounter {
    async fn decrement(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        let mut entry = self.values.entry(goods_id).or_insert(0);
        *entry -= 1;
        Ok(*entry)
    }

    async fn get(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        Ok(self.values.get(&goods_id).map(|v| *v).unwrap_or(0))
    }

    async fn set(&self, goods_id: GoodsId, value: i64) -> Result<(), StoreError> {
        self.values.insert(goods_id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn missing_key_semantics_match_redis() {
        let counter = InMemoryStockCounter::new();
        assert_eq!(counter.get(GoodsId::new(1)).await.unwrap(), 0);
        assert_eq!(counter.decrement(GoodsId::new(1)).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn set_then_decrement() {
        let counter = InMemoryStockCounter::new();
        counter.set(GoodsId::new(1), 3).await.unwrap();
        assert_eq!(counter.decrement(GoodsId::new(1)).await.unwrap(), 2);
        assert_eq!(counter.get(GoodsId::new(1)).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_decrements_are_atomic() {
        let counter = Arc::new(InMemoryStockCounter::new());
        counter.set(GoodsId::new(1), 0).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                counter.decrement(GoodsId::new(1)).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            seen.insert(h.await.unwrap());
        }

        // Every caller observed a distinct post-decrement value.
        assert_eq!(seen.len(), 64);
        assert_eq!(counter.get(GoodsId::new(1)).await.unwrap(), -64);
    }
}
