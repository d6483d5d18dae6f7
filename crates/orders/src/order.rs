use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flashsale_core::{GoodsId, OrderId, UserId};

/// A materialized flash-sale order.
///
/// Uniqueness invariant: at most one order ever exists per
/// `(user_id, goods_id)` pair. The order store enforces this on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub goods_id: GoodsId,
    pub created_at: DateTime<Utc>,
}

/// Message handed to the order queue once a request has been admitted.
///
/// Existence of the message does not guarantee eventual order creation; it is
/// a best-effort asynchronous request that the consumer may still reject
/// (stock exhausted, duplicate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub message_id: Uuid,
    pub user_id: UserId,
    pub goods_id: GoodsId,
    pub enqueued_at: DateTime<Utc>,
}

impl OrderMessage {
    pub fn new(user_id: UserId, goods_id: GoodsId) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            user_id,
            goods_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// Outcome of a flash-sale attempt as seen by the polling endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeckillResult {
    /// No decision yet; the order message may still be in flight.
    Pending,
    /// An order was created for the pair.
    Succeeded(OrderId),
    /// The sale is over for this goods; no order will be created.
    SoldOut,
}

impl SeckillResult {
    /// Wire encoding used by the polling endpoint: `orderId > 0` success,
    /// `-1` lost, `0` still pending.
    pub fn as_wire(&self) -> i64 {
        match self {
            SeckillResult::Pending => 0,
            SeckillResult::Succeeded(order_id) => order_id.as_i64(),
            SeckillResult::SoldOut => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_encoding_is_tri_state() {
        assert_eq!(SeckillResult::Pending.as_wire(), 0);
        assert_eq!(SeckillResult::SoldOut.as_wire(), -1);
        assert_eq!(SeckillResult::Succeeded(OrderId::new(42)).as_wire(), 42);
    }

    #[test]
    fn message_carries_pair_and_id() {
        let msg = OrderMessage::new(UserId::new(1), GoodsId::new(2));
        assert_eq!(msg.user_id, UserId::new(1));
        assert_eq!(msg.goods_id, GoodsId::new(2));
        assert!(!msg.message_id.is_nil());
    }
}
