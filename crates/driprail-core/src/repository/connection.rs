//! Connection repository trait definition.

use driprail_types::account::AccountId;
use driprail_types::connection::{
    Connection, ConnectionId, ConnectionStatus, ConnectorCredentials,
};
use driprail_types::error::RepositoryError;

/// Repository trait for platform-connection persistence.
///
/// Implementations live in driprail-infra (e.g., SqliteConnectionRepository)
/// and own credential encryption: `create` encrypts before writing,
/// `get_credentials` decrypts on the way out. Uses native async fn in traits
/// (Rust 2024 edition, no async_trait macro).
pub trait ConnectionRepository: Send + Sync {
    /// Persist a new connection with its credentials. Returns the stored
    /// record (never the credentials).
    fn create(
        &self,
        connection: &Connection,
        credentials: &ConnectorCredentials,
    ) -> impl std::future::Future<Output = Result<Connection, RepositoryError>> + Send;

    /// Fetch a connection record by id, any account.
    fn get_by_id(
        &self,
        id: &ConnectionId,
    ) -> impl std::future::Future<Output = Result<Option<Connection>, RepositoryError>> + Send;

    /// Decrypt and return the credentials for a connection.
    fn get_credentials(
        &self,
        id: &ConnectionId,
    ) -> impl std::future::Future<Output = Result<Option<ConnectorCredentials>, RepositoryError>> + Send;

    /// List an account's connections, newest first.
    fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<Connection>, RepositoryError>> + Send;

    /// Flip the lifecycle status (revoke, expire, re-activate).
    fn update_status(
        &self,
        id: &ConnectionId,
        status: ConnectionStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Permanently delete a connection and its credentials.
    fn delete(
        &self,
        id: &ConnectionId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
