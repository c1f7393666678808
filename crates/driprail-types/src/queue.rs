use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::trigger::TriggerEvent;

/// Transport-assigned message identifier (monotone within one queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A leased queue message as the dispatcher sees it.
///
/// `body` stays raw: decoding happens inside the dispatcher so a malformed
/// payload becomes a permanent failure for that one message instead of a
/// poll error for the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: MessageId,
    /// Raw JSON body (a TriggerEvent when well-formed).
    pub body: String,
    /// Delivery attempts including this one. 1 on first delivery.
    pub receive_count: i32,
    pub enqueued_at: DateTime<Utc>,
    /// When the lease expires and the transport may redeliver.
    pub lease_expires_at: DateTime<Utc>,
}

impl QueueMessage {
    /// Decode the body into a trigger event.
    pub fn decode(&self) -> Result<TriggerEvent, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
