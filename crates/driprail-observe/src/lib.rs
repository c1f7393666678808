//! Observability helpers for Driprail.
//!
//! `tracing_setup` installs the global subscriber (structured fmt output,
//! optional OpenTelemetry bridge); `queue_attrs` holds the span attribute
//! constants used to instrument queue operations consistently.

pub mod queue_attrs;
pub mod tracing_setup;
