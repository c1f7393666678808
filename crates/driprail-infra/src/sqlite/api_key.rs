//! SQLite API-key repository implementation.
//!
//! Stores only the SHA-256 hash of each issued key. `find_by_hash` is the
//! auth extractor's hot path and runs on the reader pool.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use driprail_core::repository::api_key::ApiKeyRepository;
use driprail_types::account::{AccountId, ApiKey};
use driprail_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ApiKeyRepository`.
pub struct SqliteApiKeyRepository {
    pool: DatabasePool,
}

impl SqliteApiKeyRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
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

fn api_key_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let account_id: String = row
        .try_get("account_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let last_used_at: Option<String> = row
        .try_get("last_used_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(ApiKey {
        id: Uuid::parse_str(&id)
            .map_err(|e| RepositoryError::Query(format!("invalid key id: {e}")))?,
        account_id: account_id
            .parse::<AccountId>()
            .map_err(|e| RepositoryError::Query(format!("invalid account id: {e}")))?,
        name,
        created_at: parse_datetime(&created_at)?,
        last_used_at: last_used_at.as_deref().map(parse_datetime).transpose()?,
    })
}

impl ApiKeyRepository for SqliteApiKeyRepository {
    async fn insert(&self, key: &ApiKey, key_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO api_keys (id, account_id, name, key_hash, created_at, last_used_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(key.id.to_string())
        .bind(key.account_id.to_string())
        .bind(&key.name)
        .bind(key_hash)
        .bind(format_datetime(&key.created_at))
        .bind(key.last_used_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict("key hash already stored".to_string()),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM api_keys WHERE key_hash = ?")
            .bind(key_hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(api_key_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn touch_last_used(&self, id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Missing rows are ignored: the stamp is best effort.
        Ok(())
    }

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<ApiKey>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM api_keys WHERE account_id = ? ORDER BY created_at DESC")
                .bind(account_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(api_key_from_row).collect()
    }

    async fn revoke(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
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
