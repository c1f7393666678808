//! Long-running worker loop: poll the queue, dispatch the batch, acknowledge
//! the non-retryable ids, repeat until cancelled.
//!
//! Delivery is at-least-once. An acknowledge that fails after a successful
//! dispatch leaves the messages to be redelivered; steps absorb that through
//! their idempotency checks, so the loop logs the error and keeps going
//! rather than crashing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::ledger::IdempotencyLedger;
use crate::loader::ConnectorLoader;
use crate::queue::QueueSource;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for one worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Most messages taken per poll.
    pub batch_size: usize,
    /// Lease granted to each polled message.
    pub visibility: Duration,
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    /// How often expired idempotency claims are swept.
    pub ledger_sweep_interval: Duration,
    /// Claims older than this are dropped by the sweep.
    pub ledger_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            visibility: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            ledger_sweep_interval: Duration::from_secs(300),
            ledger_retention: Duration::from_secs(86_400),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

/// Owns the poll/dispatch/acknowledge cycle for one queue.
///
/// Multiple loops may run against the same queue; the visibility lease keeps
/// them from processing the same message concurrently.
pub struct WorkerLoop<Q, L, G> {
    queue: Arc<Q>,
    dispatcher: Arc<Dispatcher<L>>,
    ledger: Arc<G>,
    config: WorkerConfig,
}

impl<Q, L, G> WorkerLoop<Q, L, G>
where
    Q: QueueSource,
    L: ConnectorLoader + 'static,
    G: IdempotencyLedger,
{
    pub fn new(
        queue: Arc<Q>,
        dispatcher: Arc<Dispatcher<L>>,
        ledger: Arc<G>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            ledger,
            config,
        }
    }

    /// Run until the token is cancelled. A batch in flight when cancellation
    /// arrives is finished and acknowledged before the loop exits; unpolled
    /// messages stay queued.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            visibility_secs = self.config.visibility.as_secs(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "worker loop started"
        );

        let mut last_sweep = tokio::time::Instant::now();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let batch = match self
                .queue
                .poll(self.config.batch_size, self.config.visibility)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, "queue poll failed");
                    if self.idle(&shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if self.idle(&shutdown).await {
                    break;
                }
            } else {
                let disposition = self.dispatcher.handle_batch(batch).await;

                let succeeded = disposition
                    .outcomes
                    .iter()
                    .filter(|o| o.outcome.is_success())
                    .count();
                let retried = disposition.retry.len();
                let failed = disposition.outcomes.len() - succeeded - retried;

                let acknowledged = disposition.acknowledged();
                if !acknowledged.is_empty() {
                    if let Err(e) = self.queue.acknowledge(&acknowledged).await {
                        tracing::error!(
                            error = %e,
                            count = acknowledged.len(),
                            "acknowledge failed; messages will be redelivered"
                        );
                    }
                }

                tracing::info!(succeeded, retried, failed, "batch complete");
            }

            if last_sweep.elapsed() >= self.config.ledger_sweep_interval {
                match self.ledger.sweep(self.config.ledger_retention).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "swept idempotency claims"),
                    Err(e) => tracing::warn!(error = %e, "ledger sweep failed"),
                }
                last_sweep = tokio::time::Instant::now();
            }
        }

        tracing::info!("worker loop stopped");
    }

    /// Sleep one poll interval, waking early on shutdown. Returns true when
    /// the loop should exit.
    async fn idle(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.config.poll_interval) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
