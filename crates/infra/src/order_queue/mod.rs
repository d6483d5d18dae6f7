//! Order queue transports.
//!
//! The queue contract (and the in-memory implementation used in tests/dev)
//! lives in `flashsale-orders`. This module provides the durable Redis
//! Streams transport.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsError, RedisStreamsOrderQueue};
