//! Connector loader: connection id + account -> live connector.
//!
//! The loader is the only path from a stored connection to a usable
//! connector, and it owns the authorization checks along the way. It caches
//! nothing: every execution gets a freshly built connector, so rotated or
//! revoked credentials take effect on the very next message.

use std::sync::Arc;

use driprail_types::account::AccountId;
use driprail_types::connection::{ConnectionId, ConnectionStatus};
use driprail_types::error::ConnectorError;

use crate::connector::{BoxConnector, ConnectorBuilder};
use crate::repository::connection::ConnectionRepository;

/// Resolves a connection reference to a live connector for one account.
///
/// Error statuses are part of the contract and pass through verbatim at the
/// HTTP boundary:
/// - 404: no such connection
/// - 403: connection owned by a different account, or credential not active
/// - 500: the connection store itself failed
pub trait ConnectorLoader: Send + Sync {
    fn load(
        &self,
        connection_id: &ConnectionId,
        account_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<BoxConnector, ConnectorError>> + Send;
}

/// Store-backed loader: fetch the record, verify ownership and credential
/// state, then hand decrypted credentials to the platform builder.
pub struct StoreConnectorLoader<R, B> {
    connections: Arc<R>,
    builder: Arc<B>,
}

impl<R, B> StoreConnectorLoader<R, B> {
    pub fn new(connections: Arc<R>, builder: Arc<B>) -> Self {
        Self {
            connections,
            builder,
        }
    }
}

impl<R, B> ConnectorLoader for StoreConnectorLoader<R, B>
where
    R: ConnectionRepository,
    B: ConnectorBuilder,
{
    async fn load(
        &self,
        connection_id: &ConnectionId,
        account_id: &AccountId,
    ) -> Result<BoxConnector, ConnectorError> {
        let record = self
            .connections
            .get_by_id(connection_id)
            .await
            .map_err(|e| ConnectorError::store(format!("connection lookup failed: {e}")))?
            .ok_or_else(|| {
                ConnectorError::not_found(format!("connection {connection_id} not found"))
            })?;

        if record.account_id != *account_id {
            tracing::warn!(
                connection_id = %connection_id,
                account_id = %account_id,
                "cross-account connection access denied"
            );
            return Err(ConnectorError::forbidden(
                "connection belongs to a different account",
            ));
        }

        if record.status != ConnectionStatus::Active {
            return Err(ConnectorError::forbidden(format!(
                "connection {} credential is {}",
                record.id, record.status
            )));
        }

        let credentials = self
            .connections
            .get_credentials(connection_id)
            .await
            .map_err(|e| ConnectorError::store(format!("credential fetch failed: {e}")))?
            // A record without credentials is store corruption, not a 404.
            .ok_or_else(|| {
                ConnectorError::store(format!("connection {connection_id} has no credentials"))
            })?;

        self.builder.build(&record, credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;
    use chrono::Utc;
    use dashmap::DashMap;
    use driprail_types::connection::{Connection, ConnectorCredentials, Platform};
    use driprail_types::connector::{ConnectorCapabilities, Tag};
    use driprail_types::error::RepositoryError;

    struct FakeConnectionRepo {
        records: DashMap<ConnectionId, (Connection, ConnectorCredentials)>,
        fail_lookups: bool,
    }

    impl FakeConnectionRepo {
        fn new() -> Self {
            Self {
                records: DashMap::new(),
                fail_lookups: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: DashMap::new(),
                fail_lookups: true,
            }
        }

        fn insert(&self, connection: Connection, credentials: ConnectorCredentials) {
            self.records
                .insert(connection.id.clone(), (connection, credentials));
        }
    }

    impl ConnectionRepository for FakeConnectionRepo {
        async fn create(
            &self,
            connection: &Connection,
            credentials: &ConnectorCredentials,
        ) -> Result<Connection, RepositoryError> {
            self.insert(connection.clone(), credentials.clone());
            Ok(connection.clone())
        }

        async fn get_by_id(
            &self,
            id: &ConnectionId,
        ) -> Result<Option<Connection>, RepositoryError> {
            if self.fail_lookups {
                return Err(RepositoryError::Query("disk on fire".to_string()));
            }
            Ok(self.records.get(id).map(|e| e.value().0.clone()))
        }

        async fn get_credentials(
            &self,
            id: &ConnectionId,
        ) -> Result<Option<ConnectorCredentials>, RepositoryError> {
            Ok(self.records.get(id).map(|e| e.value().1.clone()))
        }

        async fn list_by_account(
            &self,
            account_id: &AccountId,
        ) -> Result<Vec<Connection>, RepositoryError> {
            Ok(self
                .records
                .iter()
                .filter(|e| e.value().0.account_id == *account_id)
                .map(|e| e.value().0.clone())
                .collect())
        }

        async fn update_status(
            &self,
            id: &ConnectionId,
            status: ConnectionStatus,
        ) -> Result<(), RepositoryError> {
            match self.records.get_mut(id) {
                Some(mut e) => {
                    e.value_mut().0.status = status;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn delete(&self, id: &ConnectionId) -> Result<(), RepositoryError> {
            self.records.remove(id);
            Ok(())
        }
    }

    struct StubConnector;

    impl Connector for StubConnector {
        fn platform(&self) -> Platform {
            Platform::Hubspot
        }

        fn capabilities(&self) -> ConnectorCapabilities {
            ConnectorCapabilities {
                tags: true,
                ..Default::default()
            }
        }

        async fn get_tags(&self, _contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
            Ok(vec![])
        }
    }

    struct StubBuilder;

    impl ConnectorBuilder for StubBuilder {
        fn build(
            &self,
            _connection: &Connection,
            _credentials: ConnectorCredentials,
        ) -> Result<BoxConnector, ConnectorError> {
            Ok(BoxConnector::new(StubConnector))
        }
    }

    fn connection(account_id: &AccountId, status: ConnectionStatus) -> Connection {
        Connection {
            id: ConnectionId::new(),
            account_id: account_id.clone(),
            platform: Platform::Hubspot,
            display_name: "Main CRM".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn token() -> ConnectorCredentials {
        ConnectorCredentials::ApiToken {
            token: "pat-123".to_string(),
        }
    }

    fn loader(repo: FakeConnectionRepo) -> StoreConnectorLoader<FakeConnectionRepo, StubBuilder> {
        StoreConnectorLoader::new(Arc::new(repo), Arc::new(StubBuilder))
    }

    #[tokio::test]
    async fn test_load_active_connection() {
        let account = AccountId::new();
        let conn = connection(&account, ConnectionStatus::Active);
        let repo = FakeConnectionRepo::new();
        repo.insert(conn.clone(), token());

        let connector = loader(repo).load(&conn.id, &account).await.unwrap();
        assert_eq!(connector.platform(), Platform::Hubspot);
    }

    #[tokio::test]
    async fn test_load_missing_connection_is_404() {
        let err = loader(FakeConnectionRepo::new())
            .load(&ConnectionId::new(), &AccountId::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, 404);
    }

    #[tokio::test]
    async fn test_load_cross_account_is_403() {
        let owner = AccountId::new();
        let conn = connection(&owner, ConnectionStatus::Active);
        let repo = FakeConnectionRepo::new();
        repo.insert(conn.clone(), token());

        let err = loader(repo)
            .load(&conn.id, &AccountId::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);
        assert!(err.message.contains("different account"));
    }

    #[tokio::test]
    async fn test_load_revoked_credential_is_403() {
        let account = AccountId::new();
        let conn = connection(&account, ConnectionStatus::Revoked);
        let repo = FakeConnectionRepo::new();
        repo.insert(conn.clone(), token());

        let err = loader(repo).load(&conn.id, &account).await.unwrap_err();
        assert_eq!(err.status, 403);
        assert!(err.message.contains("revoked"));
    }

    #[tokio::test]
    async fn test_load_store_failure_is_500() {
        let err = loader(FakeConnectionRepo::failing())
            .load(&ConnectionId::new(), &AccountId::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert!(err.is_retryable());
    }
}
