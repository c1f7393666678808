use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::account::AccountId;
use crate::connection::ConnectionId;

/// A queued trigger event. One queue message body is one JSON-encoded
/// TriggerEvent, and one event maps to exactly one step execution.
///
/// `event_id` is the deduplication identity: redeliveries of the same
/// message carry the same id, and idempotent steps key off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: Uuid,
    /// Registry identifier of the step to execute ("tag_contact").
    pub step_kind: String,
    pub account_id: AccountId,
    /// Platform-native contact identifier, when the trigger concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Step-specific arguments, validated by the step itself.
    #[serde(default)]
    pub payload: Value,
    /// Connections the step needs; the context builder loads every one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionId>,
    pub occurred_at: DateTime<Utc>,
}

impl TriggerEvent {
    /// Create an event with a fresh UUID v7 `event_id`.
    pub fn new(step_kind: impl Into<String>, account_id: AccountId) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            step_kind: step_kind.into(),
            account_id,
            contact_id: None,
            payload: Value::Null,
            connections: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_connections(mut self, connections: Vec<ConnectionId>) -> Self {
        self.connections = connections;
        self
    }
}

/// Request body for the event-enqueue endpoint. The server stamps
/// `event_id`, `account_id` (from auth), and `occurred_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub step_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub connections: Vec<ConnectionId>,
    /// Optional delivery delay in seconds (drip scheduling).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_assigns_unique_event_ids() {
        let account = AccountId::new();
        let a = TriggerEvent::new("tag_contact", account.clone());
        let b = TriggerEvent::new("tag_contact", account);
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_serde_roundtrip_full() {
        let event = TriggerEvent::new("send_sms", AccountId::new())
            .with_contact("crm-771")
            .with_payload(json!({"template": "welcome"}))
            .with_connections(vec![ConnectionId::new()]);
        let json = serde_json::to_string(&event).unwrap();
        let back: TriggerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_serde_defaults_for_optional_fields() {
        // Producers may omit contact/payload/connections entirely.
        let raw = json!({
            "event_id": Uuid::now_v7(),
            "step_kind": "post_webhook",
            "account_id": AccountId::new(),
            "occurred_at": Utc::now(),
        });
        let event: TriggerEvent = serde_json::from_value(raw).unwrap();
        assert!(event.contact_id.is_none());
        assert!(event.payload.is_null());
        assert!(event.connections.is_empty());
    }

    #[test]
    fn test_optional_fields_omitted_when_empty() {
        let event = TriggerEvent::new("tag_contact", AccountId::new());
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("contact_id"));
        assert!(!json.contains("connections"));
    }
}
