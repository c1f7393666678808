//! CLI command definitions and dispatch for the `drail` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a verb-noun
//! pattern (e.g., `drail create account`, `drail list accounts`).

pub mod account;
pub mod enqueue;
pub mod key;
pub mod steps;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Queue-dispatch engine for marketing automation steps.
#[derive(Parser)]
#[command(name = "drail", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit OpenTelemetry spans (stdout exporter) alongside logs.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new resource.
    Create {
        #[command(subcommand)]
        resource: CreateResource,
    },

    /// List resources.
    #[command(alias = "ls")]
    List {
        #[command(subcommand)]
        resource: ListResource,
    },

    /// Manage API keys (issue, list, revoke).
    Key {
        #[command(subcommand)]
        action: key::KeyCommand,
    },

    /// List the registered step kinds.
    Steps,

    /// Enqueue a trigger event directly, without the HTTP API.
    Enqueue {
        /// Account id the event belongs to.
        #[arg(long)]
        account: String,

        /// Step kind to execute (see `drail steps`).
        #[arg(long)]
        step: String,

        /// Platform-native contact identifier.
        #[arg(long)]
        contact: Option<String>,

        /// Step payload as inline JSON.
        #[arg(long)]
        payload: Option<String>,

        /// Connection id the step needs (repeatable).
        #[arg(long = "connection")]
        connections: Vec<String>,

        /// Delivery delay in seconds (drip scheduling).
        #[arg(long)]
        delay_seconds: Option<u64>,
    },

    /// Start the REST API server with an embedded queue worker.
    Serve {
        /// Port to listen on (overrides config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long)]
        host: Option<String>,

        /// Serve HTTP only; run the worker separately with `drail work`.
        #[arg(long)]
        no_worker: bool,
    },

    /// Run the queue worker loop in the foreground.
    Work,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CreateResource {
    /// Create a new tenant account.
    Account {
        /// Account display name.
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ListResource {
    /// List all accounts.
    Accounts,
}
