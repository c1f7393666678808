//! Inbound-webhook (hook) repository trait definition.

use driprail_types::account::AccountId;
use driprail_types::error::RepositoryError;
use driprail_types::hook::Hook;
use uuid::Uuid;

/// Repository trait for hook persistence. Hook names are globally unique
/// because they form the public URL path (`/hooks/{name}`).
pub trait HookRepository: Send + Sync {
    fn create(
        &self,
        hook: &Hook,
    ) -> impl std::future::Future<Output = Result<Hook, RepositoryError>> + Send;

    /// Look up by public name; the ingestion handler's hot path.
    fn get_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Hook>, RepositoryError>> + Send;

    fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<Hook>, RepositoryError>> + Send;

    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
