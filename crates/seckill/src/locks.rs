//! Per-goods reconciliation locks.
//!
//! At most one task per goods may read the authoritative store and resync the
//! counter at a time; the rest of a contending batch blocks and then benefits
//! from the first task's work. Locks are created lazily on first contention
//! and live for the process lifetime.
//!
//! The table is process-local: in a multi-instance deployment it does not
//! serialize reconciliation across processes. That is an accepted limitation;
//! redundant cross-process resyncs are tolerated by the reconciliation
//! algorithm itself.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use flashsale_core::GoodsId;

#[derive(Debug, Default)]
pub struct ReconcileLocks {
    locks: DashMap<GoodsId, Arc<Mutex<()>>>,
}

impl ReconcileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a goods id, created on first use.
    pub fn lock_for(&self, goods_id: GoodsId) -> Arc<Mutex<()>> {
        self.locks
            .entry(goods_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
