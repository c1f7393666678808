//! Idempotency ledger: dedup claims for unsafe-to-repeat side effects.
//!
//! At-least-once delivery means a step can run twice for the same event.
//! Effects that can be checked cheaply (is the tag already there?) verify
//! state instead; effects that cannot (an SMS, a row append) claim the
//! event here first and treat a lost claim as "already done".

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use std::time::Duration;

use driprail_types::account::AccountId;
use driprail_types::error::LedgerError;

/// Dedup-claim store keyed by (account, event).
///
/// The contract steps rely on:
/// - `claim` is atomic: exactly one of two concurrent claimers wins.
/// - A claim survives until released or swept, including across process
///   restarts for durable implementations.
/// - `release` undoes a claim whose side effect failed retryably, so the
///   redelivered message can try again.
pub trait IdempotencyLedger: Send + Sync {
    /// Try to claim the event. Returns true when this call made the claim,
    /// false when it was already claimed.
    fn claim(
        &self,
        account_id: &AccountId,
        event_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, LedgerError>> + Send;

    /// Give the claim back after a retryable failure.
    fn release(
        &self,
        account_id: &AccountId,
        event_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Drop claims older than `retention`. Returns how many went away.
    fn sweep(
        &self,
        retention: Duration,
    ) -> impl std::future::Future<Output = Result<u64, LedgerError>> + Send;
}

/// In-memory ledger for tests and single-process setups. Production wiring
/// uses the SQLite-backed implementation in driprail-infra.
pub struct MemoryLedger {
    claims: DashMap<(AccountId, Uuid), DateTime<Utc>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            claims: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyLedger for MemoryLedger {
    async fn claim(&self, account_id: &AccountId, event_id: &Uuid) -> Result<bool, LedgerError> {
        use dashmap::mapref::entry::Entry;

        match self.claims.entry((account_id.clone(), *event_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(Utc::now());
                Ok(true)
            }
        }
    }

    async fn release(&self, account_id: &AccountId, event_id: &Uuid) -> Result<(), LedgerError> {
        self.claims.remove(&(account_id.clone(), *event_id));
        Ok(())
    }

    async fn sweep(&self, retention: Duration) -> Result<u64, LedgerError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
        let before = self.claims.len();
        self.claims.retain(|_, claimed_at| *claimed_at >= cutoff);
        Ok((before - self.claims.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_claim_wins_second_loses() {
        let ledger = MemoryLedger::new();
        let account = AccountId::new();
        let event = Uuid::now_v7();

        assert!(ledger.claim(&account, &event).await.unwrap());
        assert!(!ledger.claim(&account, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_claims_scoped_by_account() {
        let ledger = MemoryLedger::new();
        let event = Uuid::now_v7();

        assert!(ledger.claim(&AccountId::new(), &event).await.unwrap());
        assert!(ledger.claim(&AccountId::new(), &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_reopens_claim() {
        let ledger = MemoryLedger::new();
        let account = AccountId::new();
        let event = Uuid::now_v7();

        assert!(ledger.claim(&account, &event).await.unwrap());
        ledger.release(&account, &event).await.unwrap();
        assert!(ledger.claim(&account, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired_claims() {
        let ledger = MemoryLedger::new();
        let account = AccountId::new();
        let old_event = Uuid::now_v7();
        let new_event = Uuid::now_v7();

        ledger.claim(&account, &old_event).await.unwrap();
        // Backdate the first claim past the retention window.
        ledger.claims.insert(
            (account.clone(), old_event),
            Utc::now() - chrono::Duration::days(30),
        );
        ledger.claim(&account, &new_event).await.unwrap();

        let swept = ledger.sweep(Duration::from_secs(7 * 24 * 3600)).await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.claim(&account, &new_event).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        use std::sync::Arc;

        let ledger = Arc::new(MemoryLedger::new());
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
