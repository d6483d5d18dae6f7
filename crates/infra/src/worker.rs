//! Background order consumer.
//!
//! Drains the order queue and materializes orders: the durable side of the
//! fire-and-forget handoff. For each message it re-checks the duplicate
//! invariant, takes one unit of authoritative stock, and inserts the order.
//! A failed stock take marks the sold-out flag so pollers converge on the
//! lost outcome and subsequent requests short-circuit.
//!
//! The consumer is idempotent: redelivered messages hit either the duplicate
//! pre-check or the order store's uniqueness constraint and become no-ops.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use flashsale_orders::{OrderMessage, OrderQueue};
use flashsale_seckill::{GoodsStore, InsertOutcome, OrderStore, SoldOutFlags, StoreError};

pub struct OrderWorker<G, O> {
    goods: G,
    orders: O,
    flags: Arc<SoldOutFlags>,
}

impl<G, O> OrderWorker<G, O>
where
    G: GoodsStore + 'static,
    O: OrderStore + 'static,
{
    pub fn new(goods: G, orders: O, flags: Arc<SoldOutFlags>) -> Self {
        Self { goods, orders, flags }
    }

    /// Spawn the consumer loop on the blocking pool.
    ///
    /// The subscription's `recv` blocks, so the loop runs off the async
    /// runtime; store calls are bridged back onto it. The task ends when the
    /// queue producer side is dropped.
    pub fn spawn<Q: OrderQueue>(self, queue: &Q) -> tokio::task::JoinHandle<()> {
        let sub = queue.subscribe();
        let handle = tokio::runtime::Handle::current();

        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(message) => {
                        if let Err(e) = handle.block_on(self.process(&message)) {
                            warn!(
                                message_id = %message.message_id,
                                goods_id = %message.goods_id,
                                "order processing failed: {e}"
                            );
                        }
                    }
                    Err(_) => break, // Queue closed
                }
            }
        })
    }

    async fn process(&self, message: &OrderMessage) -> Result<(), StoreError> {
        if self
            .orders
            .find_by_user_and_goods(message.user_id, message.goods_id)
            .await?
            .is_some()
        {
            debug!(
                user_id = %message.user_id,
                goods_id = %message.goods_id,
                "order already exists; dropping redelivered message"
            );
            return Ok(());
        }

        if !self.goods.reduce_stock(message.goods_id).await? {
            self.flags.mark_sold_out(message.goods_id);
            info!(goods_id = %message.goods_id, "stock take failed; goods exhausted");
            return Ok(());
        }

        match self
            .orders
            .insert(message.user_id, message.goods_id, Utc::now())
            .await?
        {
            InsertOutcome::Inserted(order) => {
                info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    goods_id = %order.goods_id,
                    "order created"
                );
            }
            InsertOutcome::AlreadyExists(order) => {
                // A concurrent redelivery won the insert between our
                // pre-check and here; the stock unit taken above is not
                // returned.
                warn!(order_id = %order.id, "duplicate insert race; order already existed");
            }
        }

        Ok(())
    }
}
