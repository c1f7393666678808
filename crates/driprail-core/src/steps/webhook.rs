//! Webhook step: POST a JSON body to a caller-supplied URL through the
//! [`WebhookPoster`] port. The reqwest-backed poster lives in the infra
//! crate so this module stays free of HTTP client machinery.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use driprail_types::error::ConnectorError;

use crate::context::ExecutionContext;
use crate::ledger::IdempotencyLedger;
use crate::step::{AutomationStep, StepError};
use crate::steps::release_claim;

/// Outbound HTTP port. Implementations return `Ok(status)` for 2xx
/// responses and `Err(ConnectorError { status, .. })` otherwise, so the
/// receiver's status code drives retry classification unchanged. Transport
/// failures (DNS, refused connection) map to a 503-shaped error.
pub trait WebhookPoster: Send + Sync {
    fn post(
        &self,
        url: &str,
        body: &Value,
    ) -> impl std::future::Future<Output = Result<u16, ConnectorError>> + Send;
}

pub struct PostWebhookStep<G, P> {
    ledger: Arc<G>,
    poster: Arc<P>,
}

impl<G, P> PostWebhookStep<G, P> {
    pub const KIND: &'static str = "post_webhook";

    pub fn new(ledger: Arc<G>, poster: Arc<P>) -> Self {
        Self { ledger, poster }
    }
}

#[derive(Deserialize)]
struct WebhookPayload {
    url: String,
    /// Posted as-is; `null` when the payload carries no body.
    #[serde(default)]
    body: Value,
}

impl<G, P> AutomationStep for PostWebhookStep<G, P>
where
    G: IdempotencyLedger,
    P: WebhookPoster,
{
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let payload: WebhookPayload =
            serde_json::from_value(ctx.event.payload.clone()).map_err(StepError::invalid_payload)?;
        if !payload.url.starts_with("http://") && !payload.url.starts_with("https://") {
            return Err(StepError::invalid_payload(format!(
                "url must be http(s), got '{}'",
                payload.url
            )));
        }

        if !self.ledger.claim(&ctx.account_id, &ctx.event.event_id).await? {
            tracing::debug!(
                event_id = %ctx.event.event_id,
                "duplicate delivery; webhook already claimed"
            );
            return Ok(json!({ "delivered": false, "duplicate": true }));
        }

        match self.poster.post(&payload.url, &payload.body).await {
            Ok(status) => Ok(json!({ "delivered": true, "status": status })),
            Err(e) => {
                if e.is_retryable() {
                    release_claim(&*self.ledger, ctx).await;
                }
                Err(e.into())
            }
        }
    }
}
