//! Shared domain types for Driprail.
//!
//! This crate contains the core domain types used across the Driprail platform:
//! accounts, platform connections, trigger events, execution outcomes, queue
//! envelopes, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod account;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod hook;
pub mod outcome;
pub mod queue;
pub mod template;
pub mod trigger;
