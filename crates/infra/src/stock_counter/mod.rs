//! Stock counter implementations.
//!
//! The port lives in `flashsale-seckill` as pure mechanics. This module
//! provides the in-memory counter (dev/test) and the Redis-backed counter
//! shared across process instances.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryStockCounter;
#[cfg(feature = "redis")]
pub use redis::RedisStockCounter;
