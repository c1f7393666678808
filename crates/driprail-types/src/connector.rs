use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tag as the platform reports it (CRM list membership, contact label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Platform-native identifier.
    pub id: String,
    pub name: String,
}

/// Capability flags a connector advertises. Steps check these before
/// invoking an optional capability; invoking an unadvertised one returns a
/// 501 connector error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectorCapabilities {
    /// Tag read/apply/remove.
    pub tags: bool,
    /// Record upsert (contact fields, spreadsheet rows).
    pub records: bool,
    /// Outbound message delivery.
    pub messaging: bool,
}

/// Upsert request against a platform record store. `external_id` selects an
/// existing record when the platform supports keyed upserts; without it the
/// platform appends/creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    /// Platform object type ("contact", "deal", or a sheet name).
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub fields: Map<String, Value>,
}

/// Result of a record upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertReceipt {
    /// Platform-native id of the created or updated record.
    pub record_id: String,
    /// True when the upsert created a new record.
    pub created: bool,
}

/// An outbound message (SMS today) handed to a messaging-capable connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination in platform format (E.164 for SMS).
    pub to: String,
    pub body: String,
}

/// Delivery receipt from a messaging-capable connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Platform-native message id, usable for delivery lookups.
    pub provider_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_default_all_off() {
        let caps = ConnectorCapabilities::default();
        assert!(!caps.tags);
        assert!(!caps.records);
        assert!(!caps.messaging);
    }

    #[test]
    fn test_upsert_request_serde() {
        let mut fields = Map::new();
        fields.insert("email".to_string(), Value::String("a@b.co".to_string()));
        let req = UpsertRequest {
            object: "contact".to_string(),
            external_id: Some("c-42".to_string()),
            fields,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["object"], "contact");
        assert_eq!(json["external_id"], "c-42");
        assert_eq!(json["fields"]["email"], "a@b.co");
    }

    #[test]
    fn test_upsert_request_omits_missing_external_id() {
        let req = UpsertRequest {
            object: "contact".to_string(),
            external_id: None,
            fields: Map::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("external_id"));
    }
}
