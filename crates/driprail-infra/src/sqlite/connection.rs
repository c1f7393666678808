//! SQLite connection repository implementation.
//!
//! Implements `ConnectionRepository` from `driprail-core` using sqlx with
//! split read/write pools. Credentials are serialized to JSON, encrypted
//! with the vault, and stored as BLOB. They never appear in a `Connection`
//! record or in error messages.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::Row;

use driprail_core::repository::connection::ConnectionRepository;
use driprail_types::account::AccountId;
use driprail_types::connection::{
    Connection, ConnectionId, ConnectionStatus, ConnectorCredentials, Platform,
};
use driprail_types::error::RepositoryError;

use crate::crypto::vault::VaultCrypto;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConnectionRepository`.
///
/// Owns the encrypt-on-write / decrypt-on-read boundary for platform
/// credentials.
pub struct SqliteConnectionRepository {
    pool: DatabasePool,
    vault: Arc<VaultCrypto>,
}

impl SqliteConnectionRepository {
    /// Create a new repository backed by the given pool and vault.
    pub fn new(pool: DatabasePool, vault: Arc<VaultCrypto>) -> Self {
        Self { pool, vault }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn connection_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Connection, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let account_id: String = row
        .try_get("account_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let platform: String = row
        .try_get("platform")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let display_name: String = row
        .try_get("display_name")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Connection {
        id: ConnectionId::from_str(&id)
            .map_err(|e| RepositoryError::Query(format!("invalid connection id: {e}")))?,
        account_id: account_id
            .parse::<AccountId>()
            .map_err(|e| RepositoryError::Query(format!("invalid account id: {e}")))?,
        platform: Platform::from_str(&platform).map_err(RepositoryError::Query)?,
        display_name,
        status: ConnectionStatus::from_str(&status).map_err(RepositoryError::Query)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

impl ConnectionRepository for SqliteConnectionRepository {
    async fn create(
        &self,
        connection: &Connection,
        credentials: &ConnectorCredentials,
    ) -> Result<Connection, RepositoryError> {
        let plaintext = serde_json::to_vec(credentials)
            .map_err(|_| RepositoryError::Query("failed to serialize credentials".to_string()))?;
        let credentials_enc = self
            .vault
            .encrypt(&plaintext)
            .map_err(|_| RepositoryError::Query("failed to encrypt credentials".to_string()))?;

        sqlx::query(
            "INSERT INTO connections
             (id, account_id, platform, display_name, status, credentials_enc, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(connection.id.to_string())
        .bind(connection.account_id.to_string())
        .bind(connection.platform.to_string())
        .bind(&connection.display_name)
        .bind(connection.status.to_string())
        .bind(&credentials_enc)
        .bind(format_datetime(&connection.created_at))
        .bind(format_datetime(&connection.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(connection.clone())
    }

    async fn get_by_id(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, account_id, platform, display_name, status, created_at, updated_at
             FROM connections WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(connection_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_credentials(
        &self,
        id: &ConnectionId,
    ) -> Result<Option<ConnectorCredentials>, RepositoryError> {
        let row = sqlx::query("SELECT credentials_enc FROM connections WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let credentials_enc: Vec<u8> = row
            .try_get("credentials_enc")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Error variants stay generic so ciphertext and plaintext never leak.
        let plaintext = self
            .vault
            .decrypt(&credentials_enc)
            .map_err(|_| RepositoryError::Query("failed to decrypt credentials".to_string()))?;
        let credentials: ConnectorCredentials = serde_json::from_slice(&plaintext)
            .map_err(|_| RepositoryError::Query("failed to deserialize credentials".to_string()))?;

        Ok(Some(credentials))
    }

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, account_id, platform, display_name, status, created_at, updated_at
             FROM connections WHERE account_id = ? ORDER BY created_at DESC",
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn update_status(
        &self,
        id: &ConnectionId,
        status: ConnectionStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE connections SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: &ConnectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
