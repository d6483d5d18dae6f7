use thiserror::Error;

use flashsale_core::GoodsId;

use crate::ports::StoreError;

/// Outcome taxonomy surfaced by the admission pipeline.
///
/// These are the only failures that cross the system boundary; collaborator
/// errors are folded into `Store`/`Enqueue` and mapped to a generic internal
/// failure by the HTTP layer.
#[derive(Debug, Error)]
pub enum SeckillError {
    /// The admission gate yielded no token within the configured wait.
    #[error("admission rate limit reached")]
    RateLimited,

    /// The goods id was never seeded; reads fail closed.
    #[error("unknown goods: {0}")]
    UnknownGoods(GoodsId),

    /// The item is exhausted (fast-path flag or reconciled).
    #[error("seckill is over")]
    SoldOut,

    /// The user already holds an order for this goods.
    #[error("repeated seckill")]
    DuplicatePurchase,

    /// A store collaborator failed (counter, goods, or order store).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Handoff to the order queue failed after admission.
    #[error("enqueue failed: {0}")]
    Enqueue(String),
}
