//! Execution context: everything one step execution is allowed to touch.
//!
//! The context builder runs in the dispatcher's Resolving phase. It loads
//! every connection the trigger event references and converts the message
//! lease into a deadline. A step never sees a partially-built context: if
//! any connection fails to load, the whole build fails with every failure
//! attached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;

use driprail_types::account::AccountId;
use driprail_types::connection::ConnectionId;
use driprail_types::connector::ConnectorCapabilities;
use driprail_types::error::ConnectorError;
use driprail_types::trigger::TriggerEvent;

use crate::connector::BoxConnector;
use crate::loader::ConnectorLoader;

/// Default safety margin between step deadline and lease expiry. Chosen so
/// a step that aborts at the deadline finishes reporting before the
/// transport can redeliver concurrently.
pub const DEFAULT_DEADLINE_MARGIN_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Per-invocation execution context.
///
/// Owned by exactly one execution and dropped when the step returns;
/// connectors inside are never shared or reused.
pub struct ExecutionContext {
    pub account_id: AccountId,
    pub event: TriggerEvent,
    connectors: HashMap<ConnectionId, BoxConnector>,
    /// Steps must finish (or bail out) before this instant.
    pub deadline: Instant,
}

impl ExecutionContext {
    pub fn new(
        event: TriggerEvent,
        connectors: HashMap<ConnectionId, BoxConnector>,
        deadline: Instant,
    ) -> Self {
        Self {
            account_id: event.account_id.clone(),
            event,
            connectors,
            deadline,
        }
    }

    /// Connector for a specific connection reference.
    pub fn connector(&self, id: &ConnectionId) -> Option<&BoxConnector> {
        self.connectors.get(id)
    }

    /// First connector (in the event's connection order) whose capabilities
    /// satisfy the predicate.
    pub fn connector_with(
        &self,
        predicate: impl Fn(&ConnectorCapabilities) -> bool,
    ) -> Option<&BoxConnector> {
        self.event
            .connections
            .iter()
            .filter_map(|id| self.connectors.get(id))
            .find(|connector| predicate(&connector.capabilities()))
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("account_id", &self.account_id)
            .field("event_id", &self.event.event_id)
            .field("step_kind", &self.event.step_kind)
            .field("connectors", &self.connectors.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ContextError
// ---------------------------------------------------------------------------

/// One connection that failed to load during context building.
#[derive(Debug, Clone)]
pub struct FailedConnection {
    pub connection_id: ConnectionId,
    pub error: ConnectorError,
}

fn describe_failures(failures: &[FailedConnection]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.connection_id, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Context building failed. Carries every failed connection so one report
/// covers the whole event instead of just the first broken reference.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to load connections: {}", describe_failures(.failures))]
    ConnectionsFailed { failures: Vec<FailedConnection> },
}

impl ContextError {
    /// Retry when any underlying failure might heal (store 5xx); a mix of
    /// only authorization/404 failures is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionsFailed { failures } => {
                failures.iter().any(|f| f.error.is_retryable())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

/// Builds execution contexts for the dispatcher.
///
/// Generic over `L: ConnectorLoader` for storage flexibility; the production
/// wiring uses the store-backed loader.
pub struct ContextBuilder<L> {
    loader: Arc<L>,
    safety_margin: Duration,
}

impl<L: ConnectorLoader> ContextBuilder<L> {
    pub fn new(loader: Arc<L>) -> Self {
        Self {
            loader,
            safety_margin: Duration::from_secs(DEFAULT_DEADLINE_MARGIN_SECS),
        }
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Load every referenced connection and attach the lease-derived
    /// deadline. Failures are aggregated, not short-circuited.
    pub async fn build(
        &self,
        event: &TriggerEvent,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<ExecutionContext, ContextError> {
        let mut connectors = HashMap::with_capacity(event.connections.len());
        let mut failures = Vec::new();

        for connection_id in &event.connections {
            match self.loader.load(connection_id, &event.account_id).await {
                Ok(connector) => {
                    connectors.insert(connection_id.clone(), connector);
                }
                Err(error) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        connection_id = %connection_id,
                        status = error.status,
                        error = %error,
                        "connection failed to load"
                    );
                    failures.push(FailedConnection {
                        connection_id: connection_id.clone(),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(ContextError::ConnectionsFailed { failures });
        }

        let deadline = self.deadline_from_lease(lease_expires_at);
        Ok(ExecutionContext::new(event.clone(), connectors, deadline))
    }

    /// Deadline = lease expiry minus the safety margin, floored at "now" so
    /// an already-expired lease turns into an immediate retryable timeout
    /// instead of a panic.
    fn deadline_from_lease(&self, lease_expires_at: DateTime<Utc>) -> Instant {
        let lease_remaining = (lease_expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let budget = lease_remaining.saturating_sub(self.safety_margin);
        Instant::now() + budget
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
