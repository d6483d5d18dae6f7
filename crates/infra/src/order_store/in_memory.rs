//! In-memory order store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use flashsale_core::{GoodsId, OrderId, UserId};
use flashsale_orders::SeckillOrder;
use flashsale_seckill::{InsertOutcome, OrderStore, StoreError};

/// Keyed by `(user, goods)` so the uniqueness invariant is the map key
/// itself. Order ids are assigned from a monotonic sequence starting at 1
/// (wire contract: a real order id is always `> 0`).
#[derive(Debug)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<(UserId, GoodsId), SeckillOrder>>,
    next_id: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_user_and_goods(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<Option<SeckillOrder>, StoreError> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .get(&(user_id, goods_id))
            .cloned())
    }

    async fn insert(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
        created_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut map = self.orders.write().unwrap();
        if let Some(existing) = map.get(&(user_id, goods_id)) {
            return Ok(InsertOutcome::AlreadyExists(existing.clone()));
        }

        let order = SeckillOrder {
            id: OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            user_id,
            goods_id,
            created_at,
        };
        map.insert((user_id, goods_id), order.clone());
        Ok(InsertOutcome::Inserted(order))
    }
}
