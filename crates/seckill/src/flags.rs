//! Process-local sold-out fast path.
//!
//! Once an item is known exhausted, requests are answered from this map
//! without touching the shared counter or the authoritative store. The map is
//! a pure performance cache of a logically global fact: a `false` entry only
//! means "ask the shared counter", so multiple processes converge through the
//! counter and the authoritative store even though each keeps its own flags.

use dashmap::DashMap;

use flashsale_core::GoodsId;

/// Sharded map of `GoodsId -> sold out?`.
///
/// Entries exist only for goods that were seeded; an absent entry means the
/// goods was never initialized and reads must fail closed.
#[derive(Debug, Default)]
pub struct SoldOutFlags {
    flags: DashMap<GoodsId, bool>,
}

impl SoldOutFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(true)` sold out, `Some(false)` still selling, `None` never
    /// seeded (fail closed at the caller).
    pub fn check(&self, goods_id: GoodsId) -> Option<bool> {
        self.flags.get(&goods_id).map(|entry| *entry)
    }

    /// Monotonic and idempotent: once set, later calls are no-ops.
    pub fn mark_sold_out(&self, goods_id: GoodsId) {
        self.flags.insert(goods_id, true);
    }

    /// Reset to "still selling". Only valid as part of a full
    /// reinitialization (seeding); never called on the request path.
    pub fn seed(&self, goods_id: GoodsId) {
        self.flags.insert(goods_id, false);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
