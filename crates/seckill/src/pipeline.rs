//! Admission pipeline (application-level orchestration).
//!
//! This module implements the flash-sale admission contract. It orchestrates
//! the full request lifecycle: rate gating, the sold-out fast path, the
//! atomic counter pre-decrement, double-checked reconciliation against the
//! authoritative store, the duplicate-purchase check, and the queue handoff.
//!
//! ## Admission Flow
//!
//! ```text
//! Request
//!   ↓
//! 1. RateGate token wait (bounded by timeout) → RateLimited
//!   ↓
//! 2. SoldOutFlags fast check → SoldOut (no shared-store access)
//!   ↓
//! 3. StockCounter atomic decrement
//!   ↓ (negative?)
//! 4. Reconcile under the per-goods lock → SoldOut or resync
//!   ↓
//! 5. Duplicate-purchase check → DuplicatePurchase
//!   ↓
//! 6. OrderQueue publish → respond "queued"
//! ```
//!
//! ## Why This Orchestration?
//!
//! - **Oversell prevention without a global lock**: the only cross-process
//!   synchronization on the hot path is the counter's atomic decrement.
//!   Callers that complete their decrement and still see `>= 0` proceed with
//!   no further coordination.
//! - **Bounded pressure on the authoritative store**: only the minority of
//!   requests that observe a negative counter enter reconciliation, and at
//!   most one per goods per process reads the store at a time.
//! - **Composability**: the pipeline is generic over its store ports, so
//!   tests run it against in-memory implementations and production wires
//!   Redis and Postgres without changing this module.
//!
//! ## Consistency Bound
//!
//! Reconciliation resyncs the counter to the raw authoritative value instead
//! of re-running an atomic decrement for the current request. A batch of
//! reconcilers racing the resync can therefore admit up to its own size
//! beyond the authoritative count. The durable stock take in the consumer
//! still bounds *materialized orders* by the authoritative stock; the window
//! only affects how many requests are optimistically queued.

use std::sync::Arc;

use tracing::{debug, info, warn};

use flashsale_core::{GoodsId, UserId};
use flashsale_orders::{OrderMessage, OrderQueue, SeckillResult};

use crate::error::SeckillError;
use crate::flags::SoldOutFlags;
use crate::gate::{RateGate, RateGateConfig};
use crate::locks::ReconcileLocks;
use crate::ports::{GoodsStore, OrderStore, StockCounter};

/// Flash-sale admission pipeline.
///
/// ## Generic Parameters
///
/// - `C`: shared stock counter ([`StockCounter`])
/// - `G`: authoritative goods store ([`GoodsStore`])
/// - `O`: durable order store ([`OrderStore`])
/// - `Q`: order queue producer ([`OrderQueue`])
#[derive(Debug)]
pub struct SeckillPipeline<C, G, O, Q> {
    counter: C,
    goods: G,
    orders: O,
    queue: Q,
    gate: RateGate,
    flags: Arc<SoldOutFlags>,
    locks: ReconcileLocks,
}

impl<C, G, O, Q> SeckillPipeline<C, G, O, Q>
where
    C: StockCounter,
    G: GoodsStore,
    O: OrderStore,
    Q: OrderQueue,
{
    pub fn new(counter: C, goods: G, orders: O, queue: Q, gate_config: RateGateConfig) -> Self {
        Self {
            counter,
            goods,
            orders,
            queue,
            gate: RateGate::new(gate_config),
            flags: Arc::new(SoldOutFlags::new()),
            locks: ReconcileLocks::new(),
        }
    }

    /// Sold-out flags, shared with the order consumer so it can mark
    /// exhaustion when the durable stock take fails.
    pub fn flags(&self) -> Arc<SoldOutFlags> {
        self.flags.clone()
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Seed the counter and the flags from the authoritative store.
    ///
    /// Must run to completion before the pipeline serves any request:
    /// unseeded goods fail closed on the request path. Idempotent for
    /// unchanged authoritative values.
    pub async fn seed_all(&self) -> Result<usize, SeckillError> {
        let goods = self.goods.list_goods().await?;
        for g in &goods {
            self.counter.set(g.id, g.stock_count).await?;
            self.flags.seed(g.id);
        }
        info!(count = goods.len(), "seeded stock counters and sold-out flags");
        Ok(goods.len())
    }

    /// Handle one purchase attempt. `Ok(())` means the request was queued;
    /// the final outcome is read via [`Self::result`].
    pub async fn do_seckill(&self, user_id: UserId, goods_id: GoodsId) -> Result<(), SeckillError> {
        if !self.gate.admit_within_timeout().await {
            return Err(SeckillError::RateLimited);
        }

        // Fast path: answered from process memory, no shared-store access.
        match self.flags.check(goods_id) {
            None => return Err(SeckillError::UnknownGoods(goods_id)),
            Some(true) => return Err(SeckillError::SoldOut),
            Some(false) => {}
        }

        let remaining = self.counter.decrement(goods_id).await?;
        debug!(goods_id = %goods_id, remaining, "counter decremented");
        if remaining < 0 {
            self.reconcile(goods_id).await?;
        }

        if self
            .orders
            .find_by_user_and_goods(user_id, goods_id)
            .await?
            .is_some()
        {
            // The decrement above already spent a counter slot for this
            // duplicate. Stock is not actually lost (the consumer never
            // materializes a second order), only a cache slot.
            return Err(SeckillError::DuplicatePurchase);
        }

        let message = OrderMessage::new(user_id, goods_id);
        self.queue
            .publish(message)
            .map_err(|e| SeckillError::Enqueue(format!("{e:?}")))?;

        Ok(())
    }

    /// Outcome poll for a `(user, goods)` pair. `Pending` is the default
    /// until the consumer has written a terminal state.
    pub async fn result(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<SeckillResult, SeckillError> {
        if let Some(order) = self.orders.find_by_user_and_goods(user_id, goods_id).await? {
            return Ok(SeckillResult::Succeeded(order.id));
        }

        match self.flags.check(goods_id) {
            None => Err(SeckillError::UnknownGoods(goods_id)),
            Some(true) => Ok(SeckillResult::SoldOut),
            Some(false) => Ok(SeckillResult::Pending),
        }
    }

    /// Double-checked reconciliation after a negative decrement.
    ///
    /// Guarded by the per-goods lock: one task per goods reads the
    /// authoritative store; the rest of a contending batch blocks here and
    /// then resolves against the refreshed state.
    async fn reconcile(&self, goods_id: GoodsId) -> Result<(), SeckillError> {
        let lock = self.locks.lock_for(goods_id);
        let _guard = lock.lock().await;

        // Another task may have concluded exhaustion while we waited.
        match self.flags.check(goods_id) {
            None => return Err(SeckillError::UnknownGoods(goods_id)),
            Some(true) => return Err(SeckillError::SoldOut),
            Some(false) => {}
        }

        // Another reconciler may already have restored the counter.
        if self.counter.get(goods_id).await? > 0 {
            return Ok(());
        }

        let authoritative = self
            .goods
            .stock_count(goods_id)
            .await?
            .ok_or(SeckillError::UnknownGoods(goods_id))?;

        if authoritative <= 0 {
            self.flags.mark_sold_out(goods_id);
            info!(goods_id = %goods_id, "authoritative stock exhausted; sold-out flag set");
            return Err(SeckillError::SoldOut);
        }

        // Resync to the raw authoritative value and admit the current
        // request without re-running the decrement. See the module docs for
        // the over-admission window this opens.
        self.counter.set(goods_id, authoritative).await?;
        warn!(goods_id = %goods_id, authoritative, "cached counter resynced from authoritative stock");
        Ok(())
    }
}
