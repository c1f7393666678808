//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools, plus the durable queue transport and the
//! idempotency ledger.

pub mod account;
pub mod api_key;
pub mod connection;
pub mod hook;
pub mod ledger;
pub mod pool;
pub mod queue;
pub mod template;
