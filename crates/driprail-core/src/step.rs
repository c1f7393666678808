//! The automation-step contract and its dynamic-dispatch wrapper.
//!
//! Steps are the unit of work the dispatcher executes: one trigger event
//! resolves to one step instance, which runs once against an execution
//! context and reports a typed result. Implementations live wherever their
//! collaborators live (built-ins in [`crate::steps`], HTTP-backed ones in
//! driprail-infra); the dispatcher only ever sees [`BoxStep`].

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

use driprail_types::error::{ConnectorError, LedgerError};

use crate::context::ExecutionContext;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Failure of one step execution, already classified for the queue.
///
/// Classification happens here, where the failure is understood -- the
/// dispatcher converts mechanically to an outcome and never re-derives it.
#[derive(Debug, Error)]
pub enum StepError {
    /// Transient: the transport should redeliver and another attempt may
    /// succeed (downstream 5xx, throttling, timeouts).
    #[error("retryable: {reason}")]
    Retryable { reason: String },

    /// Deterministic: retrying would repeat the same failure (bad payload,
    /// missing capability, authorization).
    #[error("permanent: {reason}")]
    Permanent { reason: String },
}

impl StepError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    /// Permanent failure for a payload the step could not understand.
    pub fn invalid_payload(detail: impl std::fmt::Display) -> Self {
        Self::Permanent {
            reason: format!("invalid payload: {detail}"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

impl From<ConnectorError> for StepError {
    fn from(err: ConnectorError) -> Self {
        if err.is_retryable() {
            Self::Retryable {
                reason: err.to_string(),
            }
        } else {
            Self::Permanent {
                reason: err.to_string(),
            }
        }
    }
}

impl From<LedgerError> for StepError {
    fn from(err: LedgerError) -> Self {
        // Ledger storage trouble is transient by nature.
        Self::Retryable {
            reason: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// AutomationStep trait
// ---------------------------------------------------------------------------

/// One registrable automation-step type.
///
/// Uses RPITIT (return-position `impl Trait` in traits) for async methods,
/// consistent with the project's Rust 2024 edition approach.
///
/// # Contract
///
/// - `execute` must be idempotent under redelivery of the same
///   `event_id`: either check current state before acting, or claim the
///   event in the idempotency ledger before an unsafe side effect.
/// - Long-running work must watch `ctx.deadline` and bail out with a
///   retryable error before the message lease expires.
/// - Instances keep no mutable state across invocations; anything shared
///   between executions is read-only or internally synchronized.
pub trait AutomationStep: Send + Sync {
    /// Registry identifier ("tag_contact"). Stable across releases.
    fn kind(&self) -> &'static str;

    /// Run the step once against a fully-built context.
    fn execute(
        &self,
        ctx: &ExecutionContext,
    ) -> impl Future<Output = Result<Value, StepError>> + Send;
}

// ---------------------------------------------------------------------------
// BoxStep -- object-safe dynamic dispatch wrapper
// ---------------------------------------------------------------------------

/// Object-safe version of [`AutomationStep`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn
/// AutomationStepDyn`). A blanket implementation is provided for all types
/// implementing `AutomationStep`.
pub trait AutomationStepDyn: Send + Sync {
    fn kind(&self) -> &'static str;

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>>;
}

/// Blanket implementation: any `AutomationStep` automatically implements
/// `AutomationStepDyn`.
impl<T: AutomationStep> AutomationStepDyn for T {
    fn kind(&self) -> &'static str {
        AutomationStep::kind(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>> {
        Box::pin(self.execute(ctx))
    }
}

/// Type-erased automation step, handed out by registry factories.
///
/// Since `AutomationStep` uses RPITIT it cannot be used as a trait object
/// directly; `BoxStep` provides equivalent methods that delegate to the
/// inner `AutomationStepDyn` trait object.
pub struct BoxStep {
    inner: Box<dyn AutomationStepDyn + Send + Sync>,
}

impl BoxStep {
    /// Wrap a concrete `AutomationStep` in a type-erased box.
    pub fn new<T: AutomationStep + 'static>(step: T) -> Self {
        Self {
            inner: Box::new(step),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        self.inner.execute_boxed(ctx).await
    }
}

/// Constructor for fresh step instances. Registered once per step kind;
/// invoked per dispatched message so executions never share instance state.
pub type StepFactory = Box<dyn Fn() -> BoxStep + Send + Sync>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
