//! Message-template repository trait definition.

use driprail_types::account::AccountId;
use driprail_types::error::RepositoryError;
use driprail_types::template::MessageTemplate;

/// Repository trait for message-template persistence. Templates are keyed
/// by (account, name); `upsert` replaces the body of an existing name.
pub trait TemplateRepository: Send + Sync {
    fn upsert(
        &self,
        template: &MessageTemplate,
    ) -> impl std::future::Future<Output = Result<MessageTemplate, RepositoryError>> + Send;

    fn get_by_name(
        &self,
        account_id: &AccountId,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<MessageTemplate>, RepositoryError>> + Send;

    /// List an account's templates, sorted by name.
    fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<MessageTemplate>, RepositoryError>> + Send;

    fn delete(
        &self,
        account_id: &AccountId,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
