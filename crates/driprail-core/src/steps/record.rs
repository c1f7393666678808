//! Record steps against the first records-capable connection.
//!
//! `update_field` rides the platform's keyed upsert, so redelivery lands on
//! the same record. `append_row` has no natural key and claims the event in
//! the idempotency ledger before writing.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use driprail_types::connector::UpsertRequest;

use crate::connector::BoxConnector;
use crate::context::ExecutionContext;
use crate::ledger::IdempotencyLedger;
use crate::step::{AutomationStep, StepError};
use crate::steps::release_claim;

pub struct UpdateFieldStep;

impl UpdateFieldStep {
    pub const KIND: &'static str = "update_field";
}

pub struct AppendRowStep<G> {
    ledger: Arc<G>,
}

impl<G> AppendRowStep<G> {
    pub const KIND: &'static str = "append_row";

    pub fn new(ledger: Arc<G>) -> Self {
        Self { ledger }
    }
}

#[derive(Deserialize)]
struct UpdateFieldPayload {
    object: String,
    #[serde(default)]
    external_id: Option<String>,
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct AppendRowPayload {
    object: String,
    fields: Map<String, Value>,
}

fn record_connector(ctx: &ExecutionContext) -> Result<&BoxConnector, StepError> {
    ctx.connector_with(|caps| caps.records)
        .ok_or_else(|| StepError::permanent("no connected platform supports records"))
}

impl AutomationStep for UpdateFieldStep {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let payload: UpdateFieldPayload =
            serde_json::from_value(ctx.event.payload.clone()).map_err(StepError::invalid_payload)?;
        if payload.fields.is_empty() {
            return Err(StepError::invalid_payload("fields must not be empty"));
        }

        // The upsert needs a key for redelivery to converge on; fall back to
        // the event's contact when the payload names no record.
        let external_id = payload
            .external_id
            .or_else(|| ctx.event.contact_id.clone())
            .ok_or_else(|| StepError::invalid_payload("external_id or contact_id is required"))?;

        let connector = record_connector(ctx)?;
        let request = UpsertRequest {
            object: payload.object,
            external_id: Some(external_id),
            fields: payload.fields,
        };

        let receipt = connector.upsert_record(&request).await?;
        Ok(json!({ "record_id": receipt.record_id, "created": receipt.created }))
    }
}

impl<G: IdempotencyLedger> AutomationStep for AppendRowStep<G> {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let payload: AppendRowPayload =
            serde_json::from_value(ctx.event.payload.clone()).map_err(StepError::invalid_payload)?;
        if payload.fields.is_empty() {
            return Err(StepError::invalid_payload("fields must not be empty"));
        }
        let connector = record_connector(ctx)?;

        if !self.ledger.claim(&ctx.account_id, &ctx.event.event_id).await? {
            tracing::debug!(
                event_id = %ctx.event.event_id,
                "duplicate delivery; row already appended"
            );
            return Ok(json!({ "appended": false, "duplicate": true }));
        }

        let request = UpsertRequest {
            object: payload.object,
            external_id: None,
            fields: payload.fields,
        };
        match connector.upsert_record(&request).await {
            Ok(receipt) => Ok(json!({ "appended": true, "record_id": receipt.record_id })),
            Err(e) => {
                if e.is_retryable() {
                    release_claim(&*self.ledger, ctx).await;
                }
                Err(e.into())
            }
        }
    }
}
