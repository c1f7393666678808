//! Infrastructure layer for Driprail.
//!
//! Contains implementations of the ports defined in `driprail-core`: SQLite
//! storage (repositories, durable queue, idempotency ledger), platform
//! connector adapters over HTTP, webhook delivery and signature verification,
//! and cryptographic operations (AES-256-GCM credential vault).

pub mod config;
pub mod connector;
pub mod crypto;
pub mod hooks;
pub mod sqlite;
pub mod webhook;
