use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flashsale_core::{DomainError, DomainResult, GoodsId};

/// A goods item participating in a flash sale.
///
/// `stock_count` is the authoritative remaining stock as persisted in the
/// durable store. The admission pipeline never mutates it directly; only the
/// order consumer reduces it when an order is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goods {
    pub id: GoodsId,
    pub name: String,
    /// Sale price in minor currency units (cents).
    pub seckill_price: i64,
    pub stock_count: i64,
    /// Sale window. Carried as catalog data; admission does not enforce it.
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl Goods {
    pub fn new(
        id: GoodsId,
        name: impl Into<String>,
        seckill_price: i64,
        stock_count: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if seckill_price < 0 {
            return Err(DomainError::validation("seckill_price cannot be negative"));
        }
        if stock_count < 0 {
            return Err(DomainError::validation("stock_count cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            seckill_price,
            stock_count,
            start_at: None,
            end_at: None,
        })
    }

    pub fn with_window(mut self, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self.end_at = Some(end_at);
        self
    }

    pub fn in_stock(&self) -> bool {
        self.stock_count > 0
    }
}
