//! Dispatch engine and trait definitions for Driprail.
//!
//! This crate holds the step registry, the connector contract, the execution
//! context builder, and the queue dispatcher, plus the "ports" (repository
//! and transport traits) that the infrastructure layer implements. It depends
//! only on `driprail-types` -- never on `driprail-infra` or any database/IO
//! crate.

pub mod connector;
pub mod context;
pub mod dispatcher;
pub mod ledger;
pub mod loader;
pub mod queue;
pub mod registry;
pub mod repository;
pub mod step;
pub mod steps;
pub mod worker;
