use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for an account, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Create a new AccountId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create an AccountId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A tenant account. Every connection, template, hook, and trigger event
/// belongs to exactly one account, and handlers never cross that boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Freeform display name (duplicates allowed).
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata for an issued API key. The key itself is shown once at issue
/// time; only its SHA-256 hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub account_id: AccountId,
    /// Label chosen at issue time ("ci", "zapier").
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Identity attached to an authenticated request after API-key validation.
///
/// Handlers read `account_id` from here and nowhere else when scoping
/// queries; a mismatch between this and a resource's owner is a 403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub key_id: Uuid,
    pub account_id: AccountId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display_roundtrip() {
        let id = AccountId::new();
        let s = id.to_string();
        let parsed: AccountId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_account_id_ordering() {
        // UUID v7 is time-sortable, so later ids compare greater as strings.
        let a = AccountId::new();
        let b = AccountId::new();
        assert!(b.0 >= a.0);
    }

    #[test]
    fn test_account_serde_roundtrip() {
        let account = Account {
            id: AccountId::new(),
            name: "Acme Marketing".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, account.id);
        assert_eq!(back.name, "Acme Marketing");
    }
}
