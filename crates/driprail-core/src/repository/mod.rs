//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (driprail-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod account;
pub mod api_key;
pub mod connection;
pub mod hook;
pub mod template;
