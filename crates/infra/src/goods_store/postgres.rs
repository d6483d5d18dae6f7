//! Postgres-backed goods store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE seckill_goods (
//!     id            BIGINT PRIMARY KEY,
//!     name          TEXT NOT NULL,
//!     seckill_price BIGINT NOT NULL,
//!     stock_count   BIGINT NOT NULL,
//!     start_at      TIMESTAMPTZ,
//!     end_at        TIMESTAMPTZ
//! );
//! ```
//!
//! `reduce_stock` is the consumer-side durable stock take: a conditional
//! `UPDATE ... WHERE stock_count > 0`, so concurrent consumers can never
//! drive the authoritative count negative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use flashsale_core::GoodsId;
use flashsale_goods::Goods;
use flashsale_seckill::{GoodsStore, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresGoodsStore {
    pool: PgPool,
}

impl PostgresGoodsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_goods(row: &sqlx::postgres::PgRow) -> Result<Goods, StoreError> {
    Ok(Goods {
        id: GoodsId::new(column(row, "id")?),
        name: column(row, "name")?,
        seckill_price: column(row, "seckill_price")?,
        stock_count: column(row, "stock_count")?,
        start_at: column::<Option<DateTime<Utc>>>(row, "start_at")?,
        end_at: column::<Option<DateTime<Utc>>>(row, "end_at")?,
    })
}

fn column<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Serialization(format!("column {name}: {e}")))
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
impl GoodsStore for PostgresGoodsStore {
    async fn list_goods(&self) -> Result<Vec<Goods>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, seckill_price, stock_count, start_at, end_at
             FROM seckill_goods
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_goods", e))?;

        rows.iter().map(row_to_goods).collect()
    }

    async fn get_goods(&self, goods_id: GoodsId) -> Result<Option<Goods>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, seckill_price, stock_count, start_at, end_at
             FROM seckill_goods
             WHERE id = $1",
        )
        .bind(goods_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_goods", e))?;

        row.as_ref().map(row_to_goods).transpose()
    }

    async fn stock_count(&self, goods_id: GoodsId) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT stock_count FROM seckill_goods WHERE id = $1")
            .bind(goods_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_count", e))?;

        row.as_ref().map(|r| column(r, "stock_count")).transpose()
    }

    async fn reduce_stock(&self, goods_id: GoodsId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE seckill_goods
             SET stock_count = stock_count - 1
             WHERE id = $1 AND stock_count > 0",
        )
        .bind(goods_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("reduce_stock", e))?;

        Ok(result.rows_affected() > 0)
    }
}
