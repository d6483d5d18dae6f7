//! In-memory order queue for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::order::OrderMessage;
use crate::queue::{OrderQueue, Subscription};

#[derive(Debug)]
pub enum InMemoryQueueError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory pub/sub queue.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - At-least-once acceptable (the consumer must be idempotent)
#[derive(Debug)]
pub struct InMemoryOrderQueue {
    subscribers: Mutex<Vec<mpsc::Sender<OrderMessage>>>,
}

impl InMemoryOrderQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for InMemoryOrderQueue {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl OrderQueue for InMemoryOrderQueue {
    type Error = InMemoryQueueError;

    fn publish(&self, message: OrderMessage) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryQueueError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<OrderMessage> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
