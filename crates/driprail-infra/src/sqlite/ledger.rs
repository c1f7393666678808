//! Durable SQLite idempotency ledger.
//!
//! Implements `IdempotencyLedger` from `driprail-core` on the split-pool
//! database. Claims are rows in `processed_events` keyed by
//! (account_id, event_id); atomicity comes from the primary key plus
//! `INSERT OR IGNORE`, and claims survive process restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use driprail_core::ledger::IdempotencyLedger;
use driprail_types::account::AccountId;
use driprail_types::error::LedgerError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `IdempotencyLedger`.
pub struct SqliteLedger {
    pool: DatabasePool,
}

impl SqliteLedger {
    /// Create a ledger backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl IdempotencyLedger for SqliteLedger {
    async fn claim(&self, account_id: &AccountId, event_id: &Uuid) -> Result<bool, LedgerError> {
        // INSERT OR IGNORE races safely: exactly one inserter affects a row.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_events (account_id, event_id, claimed_at)
             VALUES (?, ?, ?)",
        )
        .bind(account_id.to_string())
        .bind(event_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, account_id: &AccountId, event_id: &Uuid) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM processed_events WHERE account_id = ? AND event_id = ?")
            .bind(account_id.to_string())
            .bind(event_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn sweep(&self, retention: Duration) -> Result<u64, LedgerError> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|e| LedgerError::Storage(format!("retention out of range: {e}")))?;
        let cutoff = Utc::now() - retention;

        let result = sqlx::query("DELETE FROM processed_events WHERE claimed_at < ?")
            .bind(format_datetime(&cutoff))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_first_claim_wins_second_loses() {
        let ledger = SqliteLedger::new(test_pool().await);
        let account = AccountId::new();
        let event = Uuid::now_v7();

        assert!(ledger.claim(&account, &event).await.unwrap());
        assert!(!ledger.claim(&account, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_claims_scoped_by_account() {
        let ledger = SqliteLedger::new(test_pool().await);
        let event = Uuid::now_v7();

        assert!(ledger.claim(&AccountId::new(), &event).await.unwrap());
        assert!(ledger.claim(&AccountId::new(), &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_reopens_claim() {
        let ledger = SqliteLedger::new(test_pool().await);
        let account = AccountId::new();
        let event = Uuid::now_v7();

        assert!(ledger.claim(&account, &event).await.unwrap());
        ledger.release(&account, &event).await.unwrap();
        assert!(ledger.claim(&account, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_survives_reopen() {
        // Durable claims: a second ledger over the same file sees them.
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);

        let account = AccountId::new();
        let event = Uuid::now_v7();

        {
            let pool = DatabasePool::new(&url).await.unwrap();
            let ledger = SqliteLedger::new(pool);
            assert!(ledger.claim(&account, &event).await.unwrap());
        }

        let pool = DatabasePool::new(&url).await.unwrap();
        let ledger = SqliteLedger::new(pool);
        assert!(!ledger.claim(&account, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired_claims() {
        let pool = test_pool().await;
        let ledger = SqliteLedger::new(pool.clone());
        let account = AccountId::new();
        let old_event = Uuid::now_v7();
        let new_event = Uuid::now_v7();

        ledger.claim(&account, &old_event).await.unwrap();
        ledger.claim(&account, &new_event).await.unwrap();

        // Backdate the first claim past the retention window.
        sqlx::query("UPDATE processed_events SET claimed_at = ? WHERE event_id = ?")
            .bind((Utc::now() - chrono::Duration::days(30)).to_rfc3339())
            .bind(old_event.to_string())
            .execute(&pool.writer)
            .await
            .unwrap();

        let swept = ledger
            .sweep(Duration::from_secs(7 * 24 * 3600))
            .await
            .unwrap();
        assert_eq!(swept, 1);
        assert!(!ledger.claim(&account, &new_event).await.unwrap());
        assert!(ledger.claim(&account, &old_event).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        use std::sync::Arc;

        let ledger = Arc::new(SqliteLedger::new(test_pool().await));
        let account = AccountId::new();
        let event = Uuid::now_v7();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            let account = account.clone();
            handles.push(tokio::spawn(
                async move { ledger.claim(&account, &event).await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
