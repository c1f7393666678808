//! Application state wiring the dispatch engine together.
//!
//! AppState holds the concrete repositories, queue, registry, and dispatcher
//! used by both CLI commands and REST API handlers. The engine pieces are
//! generic over the ports in `driprail-core`; this module pins them to the
//! SQLite and reqwest implementations from `driprail-infra`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use driprail_core::context::ContextBuilder;
use driprail_core::dispatcher::Dispatcher;
use driprail_core::loader::StoreConnectorLoader;
use driprail_core::registry::StepRegistry;
use driprail_core::steps;
use driprail_core::worker::{WorkerConfig, WorkerLoop};
use driprail_infra::config::{load_global_config, resolve_data_dir};
use driprail_infra::connector::PlatformConnectorBuilder;
use driprail_infra::crypto::vault::VaultCrypto;
use driprail_infra::sqlite::account::SqliteAccountRepository;
use driprail_infra::sqlite::api_key::SqliteApiKeyRepository;
use driprail_infra::sqlite::connection::SqliteConnectionRepository;
use driprail_infra::sqlite::hook::SqliteHookRepository;
use driprail_infra::sqlite::ledger::SqliteLedger;
use driprail_infra::sqlite::pool::DatabasePool;
use driprail_infra::sqlite::queue::SqliteQueue;
use driprail_infra::sqlite::template::SqliteTemplateRepository;
use driprail_infra::webhook::ReqwestWebhookPoster;
use driprail_types::config::GlobalConfig;

/// Concrete type aliases for the engine generics pinned to infra implementations.
pub type ConcreteLoader =
    StoreConnectorLoader<SqliteConnectionRepository, PlatformConnectorBuilder>;

pub type ConcreteDispatcher = Dispatcher<ConcreteLoader>;

pub type ConcreteWorker = WorkerLoop<SqliteQueue, ConcreteLoader, SqliteLedger>;

/// Shared application state holding repositories and the dispatch engine.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<SqliteAccountRepository>,
    pub api_keys: Arc<SqliteApiKeyRepository>,
    pub connections: Arc<SqliteConnectionRepository>,
    pub templates: Arc<SqliteTemplateRepository>,
    pub hooks: Arc<SqliteHookRepository>,
    pub queue: Arc<SqliteQueue>,
    pub ledger: Arc<SqliteLedger>,
    pub registry: Arc<StepRegistry>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire the engine.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        Self::init_at(&data_dir).await
    }

    /// Initialize against an explicit data directory (tests use a tempdir).
    pub async fn init_at(data_dir: &Path) -> anyhow::Result<Self> {
        // Ensure data directory exists
        tokio::fs::create_dir_all(data_dir).await?;

        let config = load_global_config(data_dir).await;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("driprail.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        // Credential vault. The master key is stored in a file (vault.key)
        // so a server restart needs no interactive unlock.
        let vault = Arc::new(VaultCrypto::from_key_file(&data_dir.join("vault.key"))?);

        // Repository instances over the shared pool
        let accounts = Arc::new(SqliteAccountRepository::new(db_pool.clone()));
        let api_keys = Arc::new(SqliteApiKeyRepository::new(db_pool.clone()));
        let connections = Arc::new(SqliteConnectionRepository::new(
            db_pool.clone(),
            Arc::clone(&vault),
        ));
        let templates = Arc::new(SqliteTemplateRepository::new(db_pool.clone()));
        let hooks = Arc::new(SqliteHookRepository::new(db_pool.clone(), Arc::clone(&vault)));
        let queue = Arc::new(
            SqliteQueue::new(db_pool.clone())
                .with_max_receive_count(config.worker.max_receive_count),
        );
        let ledger = Arc::new(SqliteLedger::new(db_pool.clone()));

        // Register every built-in step, then freeze the registry. A duplicate
        // kind fails startup here rather than surprising a worker later.
        let mut registry = StepRegistry::new();
        steps::register_all(
            &mut registry,
            Arc::clone(&ledger),
            Arc::clone(&templates),
            Arc::new(ReqwestWebhookPoster::new()),
        )?;
        let registry = Arc::new(registry);

        // Wire the dispatch engine: connection store -> loader -> context
        // builder -> dispatcher.
        let loader = StoreConnectorLoader::new(
            Arc::clone(&connections),
            Arc::new(PlatformConnectorBuilder::new()),
        );
        let context_builder = ContextBuilder::new(Arc::new(loader));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::new(context_builder))
            .with_parallelism(config.worker.parallelism);

        Ok(Self {
            accounts,
            api_keys,
            connections,
            templates,
            hooks,
            queue,
            ledger,
            registry,
            dispatcher: Arc::new(dispatcher),
            config,
            data_dir: data_dir.to_path_buf(),
            db_pool,
        })
    }

    /// Build a worker loop over this state's queue and dispatcher.
    ///
    /// `drail work` runs exactly one; `drail serve` runs one in-process
    /// unless `--no-worker` splits the deployment.
    pub fn worker(&self) -> ConcreteWorker {
        let settings = &self.config.worker;
        let config = WorkerConfig {
            batch_size: settings.batch_size,
            visibility: Duration::from_secs(settings.visibility_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            ledger_retention: Duration::from_secs(settings.ledger_retention_secs),
            ..WorkerConfig::default()
        };
        WorkerLoop::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ledger),
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_at_registers_builtin_steps() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init_at(dir.path()).await.unwrap();

        let kinds = state.registry.kinds();
        assert_eq!(kinds.len(), 6);
        assert!(kinds.contains(&"tag_contact"));
        assert!(kinds.contains(&"send_sms"));
        assert!(kinds.contains(&"post_webhook"));
    }

    #[tokio::test]
    async fn test_init_at_creates_vault_key() {
        let dir = tempfile::tempdir().unwrap();
        let _state = AppState::init_at(dir.path()).await.unwrap();
        assert!(dir.path().join("vault.key").exists());
        assert!(dir.path().join("driprail.db").exists());
    }

    #[tokio::test]
    async fn test_init_at_honors_config_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "[worker]\nbatch_size = 3\nparallelism = 1\n",
        )
        .await
        .unwrap();

        let state = AppState::init_at(dir.path()).await.unwrap();
        assert_eq!(state.config.worker.batch_size, 3);
        assert_eq!(state.config.worker.parallelism, 1);
    }
}
