//! API-key repository trait definition.

use driprail_types::account::{AccountId, ApiKey};
use driprail_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for API-key persistence. Only the SHA-256 hash of a key
/// ever reaches storage; the plaintext exists once, at issue time.
pub trait ApiKeyRepository: Send + Sync {
    /// Store a freshly issued key's metadata and hash.
    fn insert(
        &self,
        key: &ApiKey,
        key_hash: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Resolve a presented key by its hash; the auth extractor's hot path.
    fn find_by_hash(
        &self,
        key_hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<ApiKey>, RepositoryError>> + Send;

    /// Stamp last-used for audit listings. Best effort; failures must not
    /// fail the request.
    fn touch_last_used(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List an account's keys for audit; hashes never leave storage.
    fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<ApiKey>, RepositoryError>> + Send;

    fn revoke(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
