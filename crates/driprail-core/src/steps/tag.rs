//! Tag steps: apply or remove a contact tag on the first tag-capable
//! connection. Both read the contact's current tags before writing, so a
//! redelivered event converges instead of double-applying.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::connector::BoxConnector;
use crate::context::ExecutionContext;
use crate::step::{AutomationStep, StepError};

pub struct TagContactStep;

impl TagContactStep {
    pub const KIND: &'static str = "tag_contact";
}

pub struct UntagContactStep;

impl UntagContactStep {
    pub const KIND: &'static str = "untag_contact";
}

#[derive(Deserialize)]
struct TagPayload {
    tag: String,
}

fn parse_tag(payload: &Value) -> Result<String, StepError> {
    let TagPayload { tag } =
        serde_json::from_value(payload.clone()).map_err(StepError::invalid_payload)?;
    if tag.trim().is_empty() {
        return Err(StepError::invalid_payload("tag must not be empty"));
    }
    Ok(tag)
}

fn contact_id(ctx: &ExecutionContext) -> Result<&str, StepError> {
    ctx.event
        .contact_id
        .as_deref()
        .ok_or_else(|| StepError::invalid_payload("contact_id is required"))
}

fn tag_connector(ctx: &ExecutionContext) -> Result<&BoxConnector, StepError> {
    ctx.connector_with(|caps| caps.tags)
        .ok_or_else(|| StepError::permanent("no connected platform supports tags"))
}

impl AutomationStep for TagContactStep {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let tag = parse_tag(&ctx.event.payload)?;
        let contact = contact_id(ctx)?;
        let connector = tag_connector(ctx)?;

        let existing = connector.get_tags(contact).await?;
        if let Some(found) = existing.iter().find(|t| t.name == tag) {
            tracing::debug!(
                event_id = %ctx.event.event_id,
                tag = tag.as_str(),
                "tag already present; nothing to apply"
            );
            return Ok(json!({ "tag": found.name, "tag_id": found.id, "changed": false }));
        }

        let applied = connector.apply_tag(contact, &tag).await?;
        Ok(json!({ "tag": applied.name, "tag_id": applied.id, "changed": true }))
    }
}

impl AutomationStep for UntagContactStep {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let tag = parse_tag(&ctx.event.payload)?;
        let contact = contact_id(ctx)?;
        let connector = tag_connector(ctx)?;

        let existing = connector.get_tags(contact).await?;
        if !existing.iter().any(|t| t.name == tag) {
            return Ok(json!({ "tag": tag, "changed": false }));
        }

        connector.remove_tag(contact, &tag).await?;
        Ok(json!({ "tag": tag, "changed": true }))
    }
}
