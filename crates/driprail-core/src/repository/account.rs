//! Account repository trait definition.

use driprail_types::account::{Account, AccountId};
use driprail_types::error::RepositoryError;

/// Repository trait for account persistence. Accounts are bootstrapped from
/// the CLI; there is no self-serve signup surface.
pub trait AccountRepository: Send + Sync {
    fn create(
        &self,
        account: &Account,
    ) -> impl std::future::Future<Output = Result<Account, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Account>, RepositoryError>> + Send;
}
