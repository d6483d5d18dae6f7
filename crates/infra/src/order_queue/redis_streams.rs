//! Redis Streams-backed order queue (durable, at-least-once delivery).
//!
//! This implementation uses Redis Streams (XADD/XREADGROUP) to provide:
//! - **Durable delivery**: Messages persist until acknowledged
//! - **At-least-once**: Messages are redelivered if not ACK'd
//! - **Consumer groups**: Each order consumer has its own consumer group
//! - **Dead-letter handling**: Messages failing past max retries go to DLQ
//!
//! ## Architecture
//!
//! - **Stream Key**: `seckill:orders` (single stream for all goods)
//! - **Consumer Groups**: One per consumer type (e.g., `orders.worker`)
//! - **Consumers**: Named consumers within groups (e.g., `worker-1`)
//! - **Dead-Letter Queue**: `seckill:orders:dlq`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, instrument, warn};

use flashsale_orders::{OrderMessage, OrderQueue, Subscription};

/// Default stream key for order messages
const DEFAULT_STREAM_KEY: &str = "seckill:orders";

/// Default dead-letter queue key
const DEFAULT_DLQ_KEY: &str = "seckill:orders:dlq";

/// Default max retries before sending to DLQ
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default pending entry timeout (messages older than this are redelivered)
const DEFAULT_PENDING_TIMEOUT_MS: u64 = 60000; // 60 seconds

#[derive(Debug, Clone)]
pub struct RedisStreamsOrderQueue {
    client: Arc<redis::Client>,
    stream_key: String,
    dlq_key: String,
    max_retries: u32,
    pending_timeout_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl RedisStreamsOrderQueue {
    /// Create a new Redis Streams order queue.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `stream_key` - Redis stream key (default: "seckill:orders")
    /// * `dlq_key` - Dead-letter queue key (default: "seckill:orders:dlq")
    pub fn new(
        redis_url: impl AsRef<str>,
        stream_key: Option<String>,
        dlq_key: Option<String>,
    ) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            stream_key: stream_key.unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            dlq_key: dlq_key.unwrap_or_else(|| DEFAULT_DLQ_KEY.to_string()),
            max_retries: DEFAULT_MAX_RETRIES,
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
        })
    }

    /// Ensure a consumer group exists (idempotent).
    pub fn ensure_consumer_group(&self, group_name: &str) -> Result<(), RedisStreamsError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        // XGROUP CREATE with MKSTREAM creates the stream if it doesn't exist.
        // "0" starts the group at the beginning of the stream. An existing
        // group makes this return an error, which we ignore.
        let _: Result<String, _> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(group_name)
            .arg("0")
            .arg("MKSTREAM")
            .query(&mut conn);

        Ok(())
    }

    /// Publish an order message to the stream (non-blocking).
    ///
    /// Uses XADD; returns as soon as Redis confirms the append.
    #[instrument(
        skip(self, message),
        fields(
            stream_key = %self.stream_key,
            user_id = %message.user_id,
            goods_id = %message.goods_id
        ),
        err
    )]
    fn publish_sync(&self, message: &OrderMessage) -> Result<(), RedisStreamsError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| RedisStreamsError::Serialization(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*") // Auto-generate message ID
            .arg("message_id")
            .arg(message.message_id.to_string())
            .arg("user_id")
            .arg(message.user_id.as_i64())
            .arg("goods_id")
            .arg(message.goods_id.as_i64())
            .arg("payload")
            .arg(&payload)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {e}")))?;

        Ok(())
    }

    /// Acknowledge processed messages (remove from the pending list).
    fn acknowledge_sync(
        &self,
        group_name: &str,
        message_ids: &[String],
    ) -> Result<(), RedisStreamsError> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let _: u64 = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(group_name)
            .arg(message_ids)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XACK failed: {e}")))?;

        Ok(())
    }

    /// Move a message to the dead-letter queue after max retries.
    fn send_to_dlq_sync(
        &self,
        message: &OrderMessage,
        original_message_id: &str,
        retry_count: u32,
    ) -> Result<(), RedisStreamsError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| RedisStreamsError::Serialization(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let _: String = redis::cmd("XADD")
            .arg(&self.dlq_key)
            .arg("*")
            .arg("original_message_id")
            .arg(original_message_id)
            .arg("retry_count")
            .arg(retry_count.to_string())
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("payload")
            .arg(&payload)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("DLQ XADD failed: {e}")))?;

        warn!(
            message_id = %original_message_id,
            retry_count = retry_count,
            "order message sent to dead-letter queue"
        );

        Ok(())
    }

    /// Read messages for a consumer: pending (unacknowledged) entries first,
    /// then new entries with a blocking timeout.
    fn read_group_sync(
        &self,
        group_name: &str,
        consumer_name: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>, RedisStreamsError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let pending = self.read_pending_sync(&mut conn, group_name, consumer_name, count)?;
        if !pending.is_empty() {
            return Ok(pending);
        }

        self.read_new_sync(&mut conn, group_name, consumer_name, count, block_ms)
    }

    /// Claim entries that have been idle too long (redelivery).
    fn read_pending_sync(
        &self,
        conn: &mut redis::Connection,
        group_name: &str,
        consumer_name: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>, RedisStreamsError> {
        let pending_info: redis::RedisResult<Vec<(String, String, u64, u64)>> =
            redis::cmd("XPENDING")
                .arg(&self.stream_key)
                .arg(group_name)
                .arg("-")
                .arg("+")
                .arg(count.to_string())
                .arg(consumer_name)
                .query(conn);

        let pending_ids = match pending_info {
            Ok(entries) => entries.into_iter().map(|(id, _, _, _)| id).collect::<Vec<_>>(),
            Err(_) => return Ok(vec![]), // No pending entries
        };

        if pending_ids.is_empty() {
            return Ok(vec![]);
        }

        let claimed: redis::RedisResult<Vec<redis::Value>> = redis::cmd("XCLAIM")
            .arg(&self.stream_key)
            .arg(group_name)
            .arg(consumer_name)
            .arg(self.pending_timeout_ms.to_string())
            .arg(&pending_ids[..])
            .query(conn);

        let claimed_entries = match claimed {
            Ok(entries) => entries,
            Err(_) => return Ok(vec![]),
        };

        let mut messages = Vec::new();
        for entry in claimed_entries {
            if let Ok(msg) = self.parse_stream_entry(entry) {
                messages.push(msg);
            }
        }

        Ok(messages)
    }

    /// Read new entries from the stream (blocking with timeout).
    fn read_new_sync(
        &self,
        conn: &mut redis::Connection,
        group_name: &str,
        consumer_name: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>, RedisStreamsError> {
        let result: redis::RedisResult<HashMap<String, Vec<redis::Value>>> =
            redis::cmd("XREADGROUP")
                .arg("GROUP")
                .arg(group_name)
                .arg(consumer_name)
                .arg("COUNT")
                .arg(count.to_string())
                .arg("BLOCK")
                .arg(block_ms.to_string())
                .arg("STREAMS")
                .arg(&self.stream_key)
                .arg(">") // Read new entries
                .query(conn);

        let stream_data = match result {
            Ok(data) => data,
            Err(e) => {
                // Blocking timeout with no new messages surfaces as a nil
                // reply the type conversion rejects.
                if e.kind() == redis::ErrorKind::TypeError {
                    return Ok(vec![]);
                }
                return Err(RedisStreamsError::Command(format!("XREADGROUP failed: {e}")));
            }
        };

        let entries = stream_data.get(&self.stream_key).cloned().unwrap_or_default();

        let mut messages = Vec::new();
        for entry in entries {
            if let Ok(msg) = self.parse_stream_entry(entry) {
                messages.push(msg);
            }
        }

        Ok(messages)
    }

    /// Parse a Redis stream entry: `[message_id, [field, value, ...]]`.
    fn parse_stream_entry(&self, entry: redis::Value) -> Result<StreamMessage, RedisStreamsError> {
        let entry_vec: Vec<redis::Value> = match entry {
            redis::Value::Bulk(v) => v,
            _ => {
                return Err(RedisStreamsError::Deserialization(
                    "invalid entry format".to_string(),
                ));
            }
        };

        if entry_vec.len() < 2 {
            return Err(RedisStreamsError::Deserialization("entry too short".to_string()));
        }

        let message_id = match &entry_vec[0] {
            redis::Value::Data(data) => String::from_utf8_lossy(data).to_string(),
            _ => {
                return Err(RedisStreamsError::Deserialization(
                    "invalid message ID format".to_string(),
                ));
            }
        };

        let fields_vec: Vec<redis::Value> = match &entry_vec[1] {
            redis::Value::Bulk(v) => v.clone(),
            _ => {
                return Err(RedisStreamsError::Deserialization(
                    "invalid fields format".to_string(),
                ));
            }
        };

        let mut fields = HashMap::new();
        for chunk in fields_vec.chunks(2) {
            if let [redis::Value::Data(key), redis::Value::Data(value)] = chunk {
                fields.insert(
                    String::from_utf8_lossy(key).to_string(),
                    String::from_utf8_lossy(value).to_string(),
                );
            }
        }

        let payload_str = fields.get("payload").ok_or_else(|| {
            RedisStreamsError::Deserialization("missing payload field".to_string())
        })?;

        let message: OrderMessage = serde_json::from_str(payload_str).map_err(|e| {
            RedisStreamsError::Deserialization(format!("failed to deserialize message: {e}"))
        })?;

        let retry_count = fields
            .get("retry_count")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);

        Ok(StreamMessage {
            message_id,
            message,
            retry_count,
        })
    }
}

/// Message received from the Redis stream with delivery metadata.
#[derive(Debug, Clone)]
struct StreamMessage {
    message_id: String,
    message: OrderMessage,
    retry_count: u32,
}

/// Consumer-group subscription backed by a polling thread.
struct RedisStreamsSubscription {
    queue: Arc<RedisStreamsOrderQueue>,
    group_name: String,
    consumer_name: String,
    buffer: Arc<Mutex<Vec<OrderMessage>>>,
    unacked: Arc<Mutex<Vec<String>>>, // Message IDs awaiting ACK
}

impl RedisStreamsSubscription {
    fn new(queue: Arc<RedisStreamsOrderQueue>, group_name: String, consumer_name: String) -> Self {
        if let Err(e) = queue.ensure_consumer_group(&group_name) {
            error!("failed to create consumer group {group_name}: {e}");
        }

        Self {
            queue,
            group_name,
            consumer_name,
            buffer: Arc::new(Mutex::new(Vec::new())),
            unacked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Poll for messages, fill the buffer, route exhausted retries to the DLQ.
    fn poll(&self) {
        match self.queue.read_group_sync(
            &self.group_name,
            &self.consumer_name,
            10,  // Read up to 10 messages at a time
            100, // 100ms blocking timeout
        ) {
            Ok(messages) => {
                let mut buffer = self.buffer.lock().unwrap();
                let mut unacked = self.unacked.lock().unwrap();

                for msg in messages {
                    if msg.retry_count >= self.queue.max_retries {
                        if let Err(e) = self.queue.send_to_dlq_sync(
                            &msg.message,
                            &msg.message_id,
                            msg.retry_count,
                        ) {
                            error!("failed to send message to DLQ: {e}");
                        }
                        // ACK so the entry leaves the pending list (it lives in the DLQ now).
                        unacked.push(msg.message_id);
                    } else {
                        buffer.push(msg.message.clone());
                        unacked.push(msg.message_id);
                    }
                }
            }
            Err(e) => {
                error!("failed to read from order stream: {e}");
            }
        }
    }

    fn flush_acks(&self) {
        let to_ack: Vec<String> = {
            let mut unacked = self.unacked.lock().unwrap();
            unacked.drain(..).collect()
        };

        if let Err(e) = self.queue.acknowledge_sync(&self.group_name, &to_ack) {
            error!("failed to acknowledge messages: {e}");
        }
    }
}

impl OrderQueue for RedisStreamsOrderQueue {
    type Error = RedisStreamsError;

    fn publish(&self, message: OrderMessage) -> Result<(), Self::Error> {
        self.publish_sync(&message)
    }

    fn subscribe(&self) -> Subscription<OrderMessage> {
        // Single default consumer group; use subscribe_with_group() to run
        // several independent consumers.
        self.subscribe_with_group("orders.worker", &format!("consumer-{}", uuid::Uuid::now_v7()))
    }
}

impl RedisStreamsOrderQueue {
    /// Subscribe with an explicit consumer group.
    ///
    /// # Arguments
    ///
    /// * `group_name` - Consumer group name (e.g., "orders.worker")
    /// * `consumer_name` - Unique consumer name within the group
    pub fn subscribe_with_group(
        &self,
        group_name: &str,
        consumer_name: &str,
    ) -> Subscription<OrderMessage> {
        let subscription = RedisStreamsSubscription::new(
            Arc::new(self.clone()),
            group_name.to_string(),
            consumer_name.to_string(),
        );

        let (tx, rx) = std::sync::mpsc::channel();

        // Background thread that polls Redis and forwards messages.
        std::thread::spawn(move || {
            loop {
                subscription.poll();

                {
                    let mut buffer = subscription.buffer.lock().unwrap();
                    for msg in buffer.drain(..) {
                        if tx.send(msg).is_err() {
                            return; // Receiver dropped
                        }
                    }
                }

                // Messages are acknowledged after being handed to the channel.
                // Entries that crash the consumer before delivery stay pending
                // and are reclaimed after the idle timeout.
                subscription.flush_acks();

                std::thread::sleep(Duration::from_millis(100));
            }
        });

        Subscription::new(rx)
    }
}
