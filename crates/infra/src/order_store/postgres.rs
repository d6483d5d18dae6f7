//! Postgres-backed order store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE seckill_orders (
//!     id         BIGSERIAL PRIMARY KEY,
//!     user_id    BIGINT NOT NULL,
//!     goods_id   BIGINT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (user_id, goods_id)
//! );
//! ```
//!
//! The `(user_id, goods_id)` unique constraint is the durable form of the
//! at-most-one-order-per-pair invariant; `insert` leans on
//! `ON CONFLICT DO NOTHING` so at-least-once consumers can re-process a
//! message without side effects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use flashsale_core::{GoodsId, OrderId, UserId};
use flashsale_orders::SeckillOrder;
use flashsale_seckill::{InsertOutcome, OrderStore, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_order(
    row: &sqlx::postgres::PgRow,
    user_id: UserId,
    goods_id: GoodsId,
) -> Result<SeckillOrder, StoreError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| StoreError::Serialization(format!("column id: {e}")))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| StoreError::Serialization(format!("column created_at: {e}")))?;
    Ok(SeckillOrder {
        id: OrderId::new(id),
        user_id,
        goods_id,
        created_at,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::Connection(format!("{operation}: {err}"))
        }
        _ => StoreError::Command(format!("{operation}: {err}")),
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_by_user_and_goods(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<Option<SeckillOrder>, StoreError> {
        let row = sqlx::query(
            "SELECT id, created_at FROM seckill_orders
             WHERE user_id = $1 AND goods_id = $2",
        )
        .bind(user_id.as_i64())
        .bind(goods_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_user_and_goods", e))?;

        row.as_ref()
            .map(|r| row_to_order(r, user_id, goods_id))
            .transpose()
    }

    async fn insert(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
        created_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO seckill_orders (user_id, goods_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, goods_id) DO NOTHING
             RETURNING id, created_at",
        )
        .bind(user_id.as_i64())
        .bind(goods_id.as_i64())
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row_to_order(&row, user_id, goods_id)?));
        }

        // Conflict: the pair already holds an order; surface the existing row.
        let existing = self
            .find_by_user_and_goods(user_id, goods_id)
            .await?
            .ok_or_else(|| {
                StoreError::Command("insert conflicted but no existing order found".to_string())
            })?;
        Ok(InsertOutcome::AlreadyExists(existing))
    }
}
