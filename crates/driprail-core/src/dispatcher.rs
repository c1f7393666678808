//! Queue dispatcher: batch in, per-message dispositions out.
//!
//! Each message moves through Received -> Resolving -> Executing ->
//! Reporting. Messages are isolated from each other: a malformed body, an
//! unknown step kind, a failed context build, a panic, or a blown deadline
//! affects only its own message. The dispatcher classifies nothing itself
//! beyond the mechanical mapping of [`StepError`] to [`ExecutionOutcome`],
//! and it never loops or backs off -- redelivery belongs to the transport.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use driprail_types::outcome::ExecutionOutcome;
use driprail_types::queue::{MessageId, QueueMessage};

use crate::context::ContextBuilder;
use crate::loader::ConnectorLoader;
use crate::registry::StepRegistry;
use crate::step::StepError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of messages executed concurrently within one batch.
pub const DEFAULT_BATCH_PARALLELISM: usize = 4;

// ---------------------------------------------------------------------------
// Dispatch bookkeeping
// ---------------------------------------------------------------------------

/// Lifecycle phase of one message inside the dispatcher, for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Received,
    Resolving,
    Executing,
    Reporting,
}

impl DispatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPhase::Received => "received",
            DispatchPhase::Resolving => "resolving",
            DispatchPhase::Executing => "executing",
            DispatchPhase::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record for one message in a batch.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub message_id: MessageId,
    /// None when the body never decoded.
    pub event_id: Option<Uuid>,
    pub step_kind: Option<String>,
    pub outcome: ExecutionOutcome,
    /// Delivery attempt this outcome belongs to (1 = first delivery).
    pub attempt: i32,
    pub elapsed_ms: u64,
}

/// What the worker does with the batch afterwards: acknowledge everything
/// except the retry set.
#[derive(Debug, Default)]
pub struct BatchDisposition {
    pub outcomes: Vec<MessageOutcome>,
    /// Message ids to leave unacknowledged for redelivery.
    pub retry: Vec<MessageId>,
}

impl BatchDisposition {
    /// Ids safe to delete from the queue (successes and permanent failures).
    pub fn acknowledged(&self) -> Vec<MessageId> {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_retryable())
            .map(|o| o.message_id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Batch dispatcher over an injected registry and context builder.
///
/// Holds no global state; two dispatchers with different registries can
/// coexist in one process (the tests do exactly that).
pub struct Dispatcher<L> {
    registry: Arc<StepRegistry>,
    context_builder: Arc<ContextBuilder<L>>,
    parallelism: usize,
}

impl<L> Dispatcher<L>
where
    L: ConnectorLoader + 'static,
{
    pub fn new(registry: Arc<StepRegistry>, context_builder: Arc<ContextBuilder<L>>) -> Self {
        Self {
            registry,
            context_builder,
            parallelism: DEFAULT_BATCH_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Dispatch one polled batch. Infallible by design: every message ends
    /// in an outcome, and sibling messages never see each other's failures.
    pub async fn handle_batch(&self, batch: Vec<QueueMessage>) -> BatchDisposition {
        if batch.is_empty() {
            return BatchDisposition::default();
        }

        let batch_size = batch.len();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut join_set = JoinSet::new();

        for message in batch {
            let registry = Arc::clone(&self.registry);
            let builder = Arc::clone(&self.context_builder);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let message_id = message.id;
                let attempt = message.receive_count;
                let started = Instant::now();

                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed; if it ever is, give the
                    // message back to the transport.
                    Err(_) => {
                        return MessageOutcome {
                            message_id,
                            event_id: None,
                            step_kind: None,
                            outcome: ExecutionOutcome::retryable("dispatch slot unavailable"),
                            attempt,
                            elapsed_ms: elapsed_ms(started),
                        };
                    }
                };

                // Shield the batch from step panics: capture, classify as
                // retryable, keep the worker alive.
                match AssertUnwindSafe(dispatch_message(registry, builder, message))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let reason = format!("step panicked: {}", panic_message(&payload));
                        tracing::error!(
                            message_id = %message_id,
                            attempt,
                            reason = reason.as_str(),
                            "step panicked; message will be redelivered"
                        );
                        MessageOutcome {
                            message_id,
                            event_id: None,
                            step_kind: None,
                            outcome: ExecutionOutcome::retryable(reason),
                            attempt,
                            elapsed_ms: elapsed_ms(started),
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(batch_size);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // catch_unwind shields panics, so this is only runtime
                // abort/cancellation; the lease will redeliver.
                Err(join_error) => {
                    tracing::error!(error = %join_error, "dispatch task aborted");
                }
            }
        }

        let retry: Vec<MessageId> = outcomes
            .iter()
            .filter(|o| o.outcome.is_retryable())
            .map(|o| o.message_id)
            .collect();

        tracing::debug!(
            batch = batch_size,
            completed = outcomes.len(),
            retry = retry.len(),
            phase = %DispatchPhase::Reporting,
            "batch dispatched"
        );

        BatchDisposition { outcomes, retry }
    }
}

/// Walk one message through decode, resolve, context build, and execution.
async fn dispatch_message<L: ConnectorLoader>(
    registry: Arc<StepRegistry>,
    builder: Arc<ContextBuilder<L>>,
    message: QueueMessage,
) -> MessageOutcome {
    let started = Instant::now();
    let message_id = message.id;
    let attempt = message.receive_count;

    tracing::debug!(
        message_id = %message_id,
        attempt,
        phase = %DispatchPhase::Received,
        "message received"
    );

    let event = match message.decode() {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                message_id = %message_id,
                error = %e,
                "malformed message body; acknowledging without retry"
            );
            return MessageOutcome {
                message_id,
                event_id: None,
                step_kind: None,
                outcome: ExecutionOutcome::permanent(format!("malformed trigger event: {e}")),
                attempt,
                elapsed_ms: elapsed_ms(started),
            };
        }
    };

    tracing::debug!(
        message_id = %message_id,
        event_id = %event.event_id,
        step_kind = event.step_kind.as_str(),
        phase = %DispatchPhase::Resolving,
        "resolving step"
    );

    let Some(factory) = registry.resolve(&event.step_kind) else {
        tracing::warn!(
            message_id = %message_id,
            event_id = %event.event_id,
            step_kind = event.step_kind.as_str(),
            "unknown step kind; acknowledging without retry"
        );
        return MessageOutcome {
            message_id,
            event_id: Some(event.event_id),
            outcome: ExecutionOutcome::permanent(format!(
                "unknown step kind '{}'",
                event.step_kind
            )),
            step_kind: Some(event.step_kind),
            attempt,
            elapsed_ms: elapsed_ms(started),
        };
    };
    let step = factory();

    let ctx = match builder.build(&event, message.lease_expires_at).await {
        Ok(ctx) => ctx,
        Err(err) => {
            let outcome = if err.is_retryable() {
                ExecutionOutcome::retryable(err.to_string())
            } else {
                ExecutionOutcome::permanent(err.to_string())
            };
            return MessageOutcome {
                message_id,
                event_id: Some(event.event_id),
                step_kind: Some(event.step_kind),
                outcome,
                attempt,
                elapsed_ms: elapsed_ms(started),
            };
        }
    };

    tracing::debug!(
        message_id = %message_id,
        event_id = %event.event_id,
        phase = %DispatchPhase::Executing,
        remaining_ms = ctx.remaining().as_millis() as u64,
        "executing step"
    );

    let outcome = match tokio::time::timeout_at(ctx.deadline, step.execute(&ctx)).await {
        Ok(Ok(output)) => ExecutionOutcome::success(output),
        Ok(Err(StepError::Retryable { reason })) => ExecutionOutcome::retryable(reason),
        Ok(Err(StepError::Permanent { reason })) => ExecutionOutcome::permanent(reason),
        Err(_) => ExecutionOutcome::retryable("deadline exceeded before completion"),
    };

    let elapsed = elapsed_ms(started);
    match &outcome {
        ExecutionOutcome::Success { .. } => {
            tracing::info!(
                message_id = %message_id,
                event_id = %event.event_id,
                step_kind = event.step_kind.as_str(),
                attempt,
                elapsed_ms = elapsed,
                phase = %DispatchPhase::Reporting,
                "step succeeded"
            );
        }
        ExecutionOutcome::RetryableFailure { reason } => {
            tracing::warn!(
                message_id = %message_id,
                event_id = %event.event_id,
                step_kind = event.step_kind.as_str(),
                attempt,
                elapsed_ms = elapsed,
                reason = reason.as_str(),
                "step failed; message will be redelivered"
            );
        }
        ExecutionOutcome::PermanentFailure { reason } => {
            tracing::warn!(
                message_id = %message_id,
                event_id = %event.event_id,
                step_kind = event.step_kind.as_str(),
                attempt,
                elapsed_ms = elapsed,
                reason = reason.as_str(),
                "step failed permanently; acknowledging without retry"
            );
        }
    }

    MessageOutcome {
        message_id,
        event_id: Some(event.event_id),
        step_kind: Some(event.step_kind),
        outcome,
        attempt,
        elapsed_ms: elapsed,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
