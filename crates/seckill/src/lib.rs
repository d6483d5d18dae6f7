//! `flashsale-seckill` — the admission-and-inventory-deduction pipeline.
//!
//! This is the only part of the repository with real concurrency and
//! consistency design: a surge of concurrent purchase requests is admitted
//! through a token-bucket gate, short-circuited against a process-local
//! sold-out flag, pre-decremented against a shared atomic counter, and
//! reconciled against the authoritative stock source when the counter goes
//! negative, before being handed to the asynchronous order queue.
//!
//! The pipeline is generic over its store ports so it can run against
//! in-memory implementations in tests and Redis/Postgres in production
//! (see `flashsale-infra`).

pub mod error;
pub mod flags;
pub mod gate;
pub mod locks;
pub mod pipeline;
pub mod ports;

pub use error::SeckillError;
pub use flags::SoldOutFlags;
pub use gate::{RateGate, RateGateConfig};
pub use locks::ReconcileLocks;
pub use pipeline::SeckillPipeline;
pub use ports::{GoodsStore, InsertOutcome, OrderStore, StockCounter, StoreError};
