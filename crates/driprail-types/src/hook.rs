use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::account::AccountId;
use crate::connection::ConnectionId;

/// An inbound-webhook mapping: external systems POST to `/hooks/{name}` and
/// a verified delivery becomes one queued trigger event for `step_kind`.
///
/// `secret` signs inbound payloads (HMAC-SHA256). Debug output and API
/// responses never include it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: Uuid,
    pub account_id: AccountId,
    /// URL path segment, globally unique.
    pub name: String,
    /// Step to enqueue for each verified delivery.
    pub step_kind: String,
    /// Connections attached to the generated events.
    #[serde(default)]
    pub connections: Vec<ConnectionId>,
    /// Shared HMAC secret agreed with the sender. Never serialized; API
    /// responses and exports carry every field but this one.
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("name", &self.name)
            .field("step_kind", &self.step_kind)
            .field("connections", &self.connections)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Request to register a hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHookRequest {
    pub name: String,
    pub step_kind: String,
    #[serde(default)]
    pub connections: Vec<ConnectionId>,
    pub secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_debug_redacts_secret() {
        let hook = Hook {
            id: Uuid::now_v7(),
            account_id: AccountId::new(),
            name: "signup".to_string(),
            step_kind: "tag_contact".to_string(),
            connections: vec![],
            secret: "whsec_abc123".to_string(),
            created_at: Utc::now(),
        };
        let debug = format!("{hook:?}");
        assert!(!debug.contains("whsec_abc123"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_hook_serialization_omits_secret() {
        let hook = Hook {
            id: Uuid::now_v7(),
            account_id: AccountId::new(),
            name: "signup".to_string(),
            step_kind: "tag_contact".to_string(),
            connections: vec![],
            secret: "whsec_abc123".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&hook).unwrap();
        assert!(!json.contains("whsec_abc123"));
        assert!(!json.contains("secret"));
    }
}
