//! Cryptographic operations for Driprail.
//!
//! - `vault`: AES-256-GCM encryption for connector credentials at rest

pub mod vault;
