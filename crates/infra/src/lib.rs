//! Infrastructure layer: stock counters, durable stores, queue transports,
//! and the order consumer.
//!
//! Each port defined in `flashsale-seckill` has an in-memory implementation
//! (dev/test) and a persistent one (Redis for the shared counter and the
//! order stream, Postgres for goods and orders). The Redis-backed pieces are
//! behind the `redis` feature.

pub mod goods_store;
pub mod order_queue;
pub mod order_store;
pub mod stock_counter;
pub mod worker;

#[cfg(test)]
mod integration_tests;
