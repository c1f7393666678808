//! SQLite hook repository implementation.
//!
//! Implements `HookRepository` from `driprail-core` using sqlx with split
//! read/write pools. The shared HMAC secret is vault-encrypted at rest
//! (same treatment as connection credentials); the attached connection ids
//! are stored as a JSON array in a TEXT column.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use driprail_core::repository::hook::HookRepository;
use driprail_types::account::AccountId;
use driprail_types::connection::ConnectionId;
use driprail_types::error::RepositoryError;
use driprail_types::hook::Hook;

use crate::crypto::vault::VaultCrypto;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `HookRepository`.
pub struct SqliteHookRepository {
    pool: DatabasePool,
    vault: Arc<VaultCrypto>,
}

impl SqliteHookRepository {
    /// Create a new repository backed by the given pool and vault.
    pub fn new(pool: DatabasePool, vault: Arc<VaultCrypto>) -> Self {
        Self { pool, vault }
    }

    fn hook_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Hook, RepositoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let account_id: String = row
            .try_get("account_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let step_kind: String = row
            .try_get("step_kind")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let connections_json: String = row
            .try_get("connections")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let secret_enc: Vec<u8> = row
            .try_get("secret_enc")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let connections: Vec<ConnectionId> = serde_json::from_str(&connections_json)
            .map_err(|e| RepositoryError::Query(format!("invalid connections list: {e}")))?;

        // Generic message so neither ciphertext nor secret reaches logs.
        let secret_bytes = self
            .vault
            .decrypt(&secret_enc)
            .map_err(|_| RepositoryError::Query("failed to decrypt hook secret".to_string()))?;
        let secret = String::from_utf8(secret_bytes)
            .map_err(|_| RepositoryError::Query("hook secret is not valid utf-8".to_string()))?;

        Ok(Hook {
            id: Uuid::parse_str(&id)
                .map_err(|e| RepositoryError::Query(format!("invalid hook id: {e}")))?,
            account_id: account_id
                .parse::<AccountId>()
                .map_err(|e| RepositoryError::Query(format!("invalid account id: {e}")))?,
            name,
            step_kind,
            connections,
            secret,
            created_at: parse_datetime(&created_at)?,
        })
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

impl HookRepository for SqliteHookRepository {
    async fn create(&self, hook: &Hook) -> Result<Hook, RepositoryError> {
        let secret_enc = self
            .vault
            .encrypt(hook.secret.as_bytes())
            .map_err(|_| RepositoryError::Query("failed to encrypt hook secret".to_string()))?;
        let connections_json = serde_json::to_string(&hook.connections)
            .map_err(|e| RepositoryError::Query(format!("invalid connections list: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO hooks (id, account_id, name, step_kind, connections, secret_enc, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(hook.id.to_string())
        .bind(hook.account_id.to_string())
        .bind(&hook.name)
        .bind(&hook.step_kind)
        .bind(&connections_json)
        .bind(&secret_enc)
        .bind(format_datetime(&hook.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(hook.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("hook '{}' already exists", hook.name)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Hook>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM hooks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(self.hook_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_account(&self, account_id: &AccountId) -> Result<Vec<Hook>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM hooks WHERE account_id = ? ORDER BY created_at DESC")
                .bind(account_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(|row| self.hook_from_row(row)).collect()
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM hooks WHERE id = ?")
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
