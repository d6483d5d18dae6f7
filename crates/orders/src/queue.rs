//! Order queue abstraction (mechanics only).
//!
//! The queue is the handoff point between the synchronous admission pipeline
//! and the asynchronous order consumer. It is intentionally **lightweight**
//! and transport-agnostic:
//!
//! - **At-least-once delivery**: messages may be delivered more than once;
//!   the consumer must be idempotent (the order store's uniqueness constraint
//!   makes re-processing a no-op).
//! - **No ordering guarantees** across producers.
//! - **No persistence assumptions**: the in-memory queue loses messages on
//!   restart; the Redis Streams implementation in `flashsale-infra` is
//!   durable.
//!
//! `publish()` can fail (bus full, network error). Failures are surfaced to
//! the pipeline, which maps them to an internal error before the HTTP
//! boundary.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::order::OrderMessage;

/// A subscription to the order message stream.
///
/// Designed for single-threaded consumption: one worker owns the
/// subscription and drains it in a loop.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Producer/consumer contract for the order queue.
pub trait OrderQueue: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    /// Hand an admitted request to the downstream consumer (fire-and-forget).
    fn publish(&self, message: OrderMessage) -> Result<(), Self::Error>;

    /// Subscribe to the message stream (consumer side).
    fn subscribe(&self) -> Subscription<OrderMessage>;
}

impl<Q> OrderQueue for Arc<Q>
where
    Q: OrderQueue + ?Sized,
{
    type Error = Q::Error;

    fn publish(&self, message: OrderMessage) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<OrderMessage> {
        (**self).subscribe()
    }
}
