//! Queue transport ports and the in-memory reference implementation.
//!
//! The transport owns at-least-once delivery: a polled message is leased
//! (invisible) for the visibility window, acknowledged messages disappear,
//! and unacknowledged ones come back with a bumped receive count. The
//! dispatcher never retries anything itself -- leaving a message unacked IS
//! the retry mechanism.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use driprail_types::error::QueueError;
use driprail_types::queue::{MessageId, QueueMessage};
use driprail_types::trigger::TriggerEvent;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Consumer side of the transport; what the worker loop polls.
pub trait QueueSource: Send + Sync {
    /// Lease up to `max` visible messages for `visibility`. May return
    /// fewer, including zero; never blocks waiting for messages.
    fn poll(
        &self,
        max: usize,
        visibility: Duration,
    ) -> impl std::future::Future<Output = Result<Vec<QueueMessage>, QueueError>> + Send;

    /// Delete delivered messages. Ids not acknowledged before their lease
    /// expires are redelivered.
    fn acknowledge(
        &self,
        ids: &[MessageId],
    ) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}

/// Producer side of the transport; what HTTP handlers and the CLI use.
pub trait QueueSink: Send + Sync {
    fn send(
        &self,
        event: &TriggerEvent,
    ) -> impl std::future::Future<Output = Result<MessageId, QueueError>> + Send;

    /// Enqueue with a delivery delay (drip scheduling).
    fn send_delayed(
        &self,
        event: &TriggerEvent,
        delay: Duration,
    ) -> impl std::future::Future<Output = Result<MessageId, QueueError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryQueue
// ---------------------------------------------------------------------------

struct StoredMessage {
    body: String,
    receive_count: i32,
    enqueued_at: DateTime<Utc>,
    visible_at: DateTime<Utc>,
}

/// In-memory queue with real visibility-timeout semantics, for tests and
/// single-process setups. Production wiring uses the durable SQLite queue
/// in driprail-infra.
pub struct MemoryQueue {
    messages: DashMap<i64, StoredMessage>,
    next_id: AtomicI64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Total messages held, leased or not.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn enqueue(&self, event: &TriggerEvent, visible_at: DateTime<Utc>) -> Result<MessageId, QueueError> {
        let body = serde_json::to_string(event).map_err(|e| QueueError::Encode(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.messages.insert(
            id,
            StoredMessage {
                body,
                receive_count: 0,
                enqueued_at: Utc::now(),
                visible_at,
            },
        );
        Ok(MessageId(id))
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueSource for MemoryQueue {
    async fn poll(
        &self,
        max: usize,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(visibility)
            .map_err(|e| QueueError::Storage(format!("visibility out of range: {e}")))?;

        // Oldest first, matching the durable queue's delivery order.
        let mut visible: Vec<i64> = self
            .messages
            .iter()
            .filter(|entry| entry.value().visible_at <= now)
            .map(|entry| *entry.key())
            .collect();
        visible.sort_unstable();
        visible.truncate(max);

        let mut leased = Vec::with_capacity(visible.len());
        for id in visible {
            if let Some(mut entry) = self.messages.get_mut(&id) {
                let message = entry.value_mut();
                // Re-check under the entry lock; a concurrent poll may have
                // leased it between the scan and here.
                if message.visible_at > now {
                    continue;
                }
                message.receive_count += 1;
                message.visible_at = now + lease;
                leased.push(QueueMessage {
                    id: MessageId(id),
                    body: message.body.clone(),
                    receive_count: message.receive_count,
                    enqueued_at: message.enqueued_at,
                    lease_expires_at: message.visible_at,
                });
            }
        }
        Ok(leased)
    }

    async fn acknowledge(&self, ids: &[MessageId]) -> Result<(), QueueError> {
        for id in ids {
            self.messages.remove(&id.0);
        }
        Ok(())
    }
}

impl QueueSink for MemoryQueue {
    async fn send(&self, event: &TriggerEvent) -> Result<MessageId, QueueError> {
        self.enqueue(event, Utc::now())
    }

    async fn send_delayed(
        &self,
        event: &TriggerEvent,
        delay: Duration,
    ) -> Result<MessageId, QueueError> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| QueueError::Storage(format!("delay out of range: {e}")))?;
        self.enqueue(event, Utc::now() + delay)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
