use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error surfaced by platform connectors and the connector loader.
///
/// Carries an HTTP-style status code. When the failure reaches a synchronous
/// HTTP caller the status passes through verbatim; when it reaches the
/// dispatcher, `is_retryable` decides between redelivery and acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status}: {message}")]
pub struct ConnectorError {
    pub status: u16,
    pub message: String,
}

impl ConnectorError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 403 -- connection exists but belongs to another account, or its
    /// credential is revoked/expired.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    /// 404 -- no such connection.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// 500 -- the connection store itself failed.
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// 501 -- the connector does not advertise the invoked capability.
    pub fn unsupported(capability: &str) -> Self {
        Self::new(501, format!("capability not supported: {capability}"))
    }

    /// Upstream platform responded with an error status; carried verbatim.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, message)
    }

    /// Asynchronous classification: should the queue redeliver the message?
    ///
    /// Timeouts, throttling, and server-side failures are retryable. Client
    /// errors are permanent, as is 501 (a missing capability never heals).
    pub fn is_retryable(&self) -> bool {
        match self.status {
            408 | 425 | 429 => true,
            501 => false,
            s => s >= 500,
        }
    }
}

/// Errors from step-registry registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("step kind '{0}' is already registered")]
    Duplicate(String),
}

/// Errors from the queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(String),

    #[error("failed to encode message body: {0}")]
    Encode(String),
}

/// Errors from the idempotency ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Errors from repository operations (used by trait definitions in driprail-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_error_display() {
        let err = ConnectorError::forbidden("connection belongs to another account");
        assert_eq!(err.to_string(), "403: connection belongs to another account");
    }

    #[test]
    fn test_connector_error_classification() {
        assert!(!ConnectorError::forbidden("x").is_retryable());
        assert!(!ConnectorError::not_found("x").is_retryable());
        assert!(!ConnectorError::unsupported("messaging").is_retryable());
        assert!(!ConnectorError::upstream(400, "bad payload").is_retryable());
        assert!(ConnectorError::store("disk full").is_retryable());
        assert!(ConnectorError::upstream(429, "throttled").is_retryable());
        assert!(ConnectorError::upstream(503, "maintenance").is_retryable());
        assert!(ConnectorError::upstream(408, "timeout").is_retryable());
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::Duplicate("tag_contact".to_string());
        assert_eq!(
            err.to_string(),
            "step kind 'tag_contact' is already registered"
        );
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }
}
