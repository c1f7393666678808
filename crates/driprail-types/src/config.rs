//! Global configuration types for Driprail.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! HTTP listener and the queue worker's polling behavior.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Driprail engine.
///
/// Loaded from `~/.driprail/config.toml`. All fields have sensible defaults,
/// so a missing or empty file yields a working single-process setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// HTTP listener settings for `drail serve`.
    #[serde(default)]
    pub server: ServerSettings,

    /// Queue-worker settings for `drail work` (and the in-process worker
    /// started by `drail serve`).
    #[serde(default)]
    pub worker: WorkerSettings,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            worker: WorkerSettings::default(),
        }
    }
}

/// Bind address for the REST API. CLI flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Tuning knobs for the queue worker loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Messages leased per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Lease duration. A message not acknowledged within this window is
    /// redelivered, so it must exceed the slowest expected step.
    #[serde(default = "default_visibility_secs")]
    pub visibility_secs: u64,

    /// Sleep between polls when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Messages executed concurrently within one batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Deliveries before a message is shelved as poisoned.
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: i32,

    /// How long idempotency claims are kept before the sweeper drops them.
    #[serde(default = "default_ledger_retention_secs")]
    pub ledger_retention_secs: u64,
}

fn default_batch_size() -> usize {
    16
}

fn default_visibility_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_parallelism() -> usize {
    4
}

fn default_max_receive_count() -> i32 {
    5
}

fn default_ledger_retention_secs() -> u64 {
    86_400
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            visibility_secs: default_visibility_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            parallelism: default_parallelism(),
            max_receive_count: default_max_receive_count(),
            ledger_retention_secs: default_ledger_retention_secs(),
        }
    }
}
