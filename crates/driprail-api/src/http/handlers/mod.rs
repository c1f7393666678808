//! HTTP request handlers for the REST API.

pub mod connection;
pub mod event;
pub mod hook;
pub mod steps;
pub mod template;
