//! Store ports consumed by the pipeline.
//!
//! The pipeline composes three external collaborators behind async traits:
//!
//! - [`StockCounter`]: the process-shared cached stock counter (Redis in
//!   production). Its `decrement` is the primary oversell-prevention
//!   mechanism and must be a single atomic operation across processes.
//! - [`GoodsStore`]: the durable, authoritative stock source. Read-only from
//!   the pipeline's perspective; only the order consumer reduces stock.
//! - [`OrderStore`]: the durable order store, used for the duplicate-purchase
//!   check and by the consumer to materialize orders.
//!
//! In-memory and Redis/Postgres implementations live in `flashsale-infra`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use flashsale_core::{GoodsId, UserId};
use flashsale_goods::Goods;
use flashsale_orders::SeckillOrder;

/// Infrastructure-level store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Process-shared cached stock counter with an atomic decrement.
#[async_trait]
pub trait StockCounter: Send + Sync {
    /// Atomically decrement the cached stock and return the post-decrement
    /// value. A missing key decrements to `-1` (Redis `DECR` semantics).
    async fn decrement(&self, goods_id: GoodsId) -> Result<i64, StoreError>;

    /// Read the cached stock. A missing key reads as `0`.
    async fn get(&self, goods_id: GoodsId) -> Result<i64, StoreError>;

    /// Overwrite the cached stock (seeding and reconciliation resync).
    async fn set(&self, goods_id: GoodsId, value: i64) -> Result<(), StoreError>;
}

/// Durable, authoritative goods/stock source.
#[async_trait]
pub trait GoodsStore: Send + Sync {
    /// All goods participating in the sale (used for seeding).
    async fn list_goods(&self) -> Result<Vec<Goods>, StoreError>;

    /// Point lookup of a goods record.
    async fn get_goods(&self, goods_id: GoodsId) -> Result<Option<Goods>, StoreError>;

    /// Authoritative remaining stock; `None` for an unknown goods id.
    async fn stock_count(&self, goods_id: GoodsId) -> Result<Option<i64>, StoreError>;

    /// Durably take one unit of stock. Returns `false` when none remains.
    /// Consumer-side only; the admission pipeline never calls this.
    async fn reduce_stock(&self, goods_id: GoodsId) -> Result<bool, StoreError>;
}

/// Result of attempting to materialize an order for a `(user, goods)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(SeckillOrder),
    /// The pair already holds an order; the existing record is returned so
    /// at-least-once consumers can treat redelivery as a no-op.
    AlreadyExists(SeckillOrder),
}

/// Durable order store.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Duplicate-purchase lookup: at most one order per `(user, goods)`.
    async fn find_by_user_and_goods(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<Option<SeckillOrder>, StoreError>;

    /// Insert an order, enforcing the `(user, goods)` uniqueness invariant.
    async fn insert(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
        created_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError>;
}

#[async_trait]
impl<T> StockCounter for Arc<T>
where
    T: StockCounter + ?Sized,
{
    async fn decrement(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        (**self).decrement(goods_id).await
    }

    async fn get(&self, goods_id: GoodsId) -> Result<i64, StoreError> {
        (**self).get(goods_id).await
    }

    async fn set(&self, goods_id: GoodsId, value: i64) -> Result<(), StoreError> {
        (**self).set(goods_id, value).await
    }
}

#[async_trait]
impl<T> GoodsStore for Arc<T>
where
    T: GoodsStore + ?Sized,
{
    async fn list_goods(&self) -> Result<Vec<Goods>, StoreError> {
        (**self).list_goods().await
    }

    async fn get_goods(&self, goods_id: GoodsId) -> Result<Option<Goods>, StoreError> {
        (**self).get_goods(goods_id).await
    }

    async fn stock_count(&self, goods_id: GoodsId) -> Result<Option<i64>, StoreError> {
        (**self).stock_count(goods_id).await
    }

    async fn reduce_stock(&self, goods_id: GoodsId) -> Result<bool, StoreError> {
        (**self).reduce_stock(goods_id).await
    }
}

#[async_trait]
impl<T> OrderStore for Arc<T>
where
    T: OrderStore + ?Sized,
{
    async fn find_by_user_and_goods(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<Option<SeckillOrder>, StoreError> {
        (**self).find_by_user_and_goods(user_id, goods_id).await
    }

    async fn insert(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
        created_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        (**self).insert(user_id, goods_id, created_at).await
    }
}
