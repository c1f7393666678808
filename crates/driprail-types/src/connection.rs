use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::account::AccountId;

/// Unique identifier for a platform connection, wrapping a UUID v7.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Third-party platforms a connection can point at. One connector adapter
/// exists per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// CRM (contacts, tags, record upserts).
    Hubspot,
    /// Spreadsheet backend (row appends).
    Sheets,
    /// SMS gateway.
    Twilio,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Hubspot => write!(f, "hubspot"),
            Platform::Sheets => write!(f, "sheets"),
            Platform::Twilio => write!(f, "twilio"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hubspot" => Ok(Platform::Hubspot),
            "sheets" => Ok(Platform::Sheets),
            "twilio" => Ok(Platform::Twilio),
            other => Err(format!("unknown platform: '{other}'")),
        }
    }
}

/// Credential lifecycle states.
///
/// - Active: usable for connector construction
/// - Revoked: user disconnected the platform; loads fail until re-auth
/// - Expired: platform rejected the credential; loads fail until rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Revoked,
    Expired,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Active => write!(f, "active"),
            ConnectionStatus::Revoked => write!(f, "revoked"),
            ConnectionStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConnectionStatus::Active),
            "revoked" => Ok(ConnectionStatus::Revoked),
            "expired" => Ok(ConnectionStatus::Expired),
            other => Err(format!("invalid connection status: '{other}'")),
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Active
    }
}

/// A platform connection owned by one account.
///
/// Credentials are NOT part of this type -- they are encrypted at rest and
/// only decrypted transiently while building a connector for an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub account_id: AccountId,
    pub platform: Platform,
    /// Freeform label ("Main CRM", "Support Twilio").
    pub display_name: String,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted platform credentials, shaped per platform.
///
/// Held in memory only for the lifetime of a single connector. Debug output
/// never includes the secret material.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectorCredentials {
    /// Bearer token (CRM private-app token, spreadsheet OAuth access token).
    ApiToken { token: String },
    /// Service-account pair for server-to-server spreadsheet access.
    ServiceAccount {
        client_email: String,
        private_key: String,
    },
    /// SMS gateway account with its sending number.
    SmsAccount {
        account_sid: String,
        auth_token: String,
        from_number: String,
    },
}

impl ConnectorCredentials {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorCredentials::ApiToken { .. } => "api_token",
            ConnectorCredentials::ServiceAccount { .. } => "service_account",
            ConnectorCredentials::SmsAccount { .. } => "sms_account",
        }
    }
}

impl fmt::Debug for ConnectorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secret material stays out of logs.
        write!(f, "ConnectorCredentials({})", self.kind())
    }
}

/// Request to register a new connection. Credentials are encrypted before
/// they touch storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConnectionRequest {
    pub platform: Platform,
    pub display_name: String,
    pub credentials: ConnectorCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_roundtrip() {
        for platform in [Platform::Hubspot, Platform::Sheets, Platform::Twilio] {
            let s = platform.to_string();
            let parsed: Platform = s.parse().unwrap();
            assert_eq!(platform, parsed);
        }
    }

    #[test]
    fn test_platform_unknown() {
        assert!("salesforce".parse::<Platform>().is_err());
    }

    #[test]
    fn test_connection_status_roundtrip() {
        for status in [
            ConnectionStatus::Active,
            ConnectionStatus::Revoked,
            ConnectionStatus::Expired,
        ] {
            let s = status.to_string();
            let parsed: ConnectionStatus = s.parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = ConnectorCredentials::ApiToken {
            token: "pat-secret-value".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("pat-secret-value"));
        assert!(debug.contains("api_token"));
    }

    #[test]
    fn test_credentials_serde_tagged() {
        let creds = ConnectorCredentials::SmsAccount {
            account_sid: "AC123".to_string(),
            auth_token: "tok".to_string(),
            from_number: "+15550100".to_string(),
        };
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["kind"], "sms_account");
        assert_eq!(json["account_sid"], "AC123");
    }

    #[test]
    fn test_connection_id_display_roundtrip() {
        let id = ConnectionId::new();
        let parsed: ConnectionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
