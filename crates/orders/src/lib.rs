//! Orders domain: order records, queue messages, and the order-queue
//! pub/sub abstraction.
//!
//! The queue contract lives here as pure mechanics; infrastructure-backed
//! implementations (Redis Streams) live in `flashsale-infra`.

pub mod in_memory_queue;
pub mod order;
pub mod queue;

pub use in_memory_queue::{InMemoryOrderQueue, InMemoryQueueError};
pub use order::{OrderMessage, SeckillOrder, SeckillResult};
pub use queue::{OrderQueue, Subscription};
