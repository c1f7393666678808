//! SMS step: render a stored template (or take an inline body) and hand the
//! message to the first messaging-capable connection. Sends are guarded by
//! an idempotency claim; a redelivered event that already claimed its send
//! reports `duplicate` instead of texting the contact twice.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use driprail_types::connector::OutboundMessage;

use crate::context::ExecutionContext;
use crate::ledger::IdempotencyLedger;
use crate::repository::template::TemplateRepository;
use crate::step::{AutomationStep, StepError};
use crate::steps::release_claim;

pub struct SendSmsStep<G, T> {
    ledger: Arc<G>,
    templates: Arc<T>,
}

impl<G, T> SendSmsStep<G, T> {
    pub const KIND: &'static str = "send_sms";

    pub fn new(ledger: Arc<G>, templates: Arc<T>) -> Self {
        Self { ledger, templates }
    }
}

#[derive(Deserialize)]
struct SmsPayload {
    to: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    variables: Map<String, Value>,
}

impl<G, T> SendSmsStep<G, T>
where
    T: TemplateRepository,
{
    /// Template name wins over inline body when both are present.
    async fn resolve_body(
        &self,
        ctx: &ExecutionContext,
        payload: &SmsPayload,
    ) -> Result<String, StepError> {
        if let Some(name) = &payload.template {
            let template = self
                .templates
                .get_by_name(&ctx.account_id, name)
                .await
                .map_err(|e| StepError::retryable(format!("template lookup failed: {e}")))?
                .ok_or_else(|| StepError::permanent(format!("template '{name}' not found")))?;
            return Ok(template.render(&payload.variables));
        }
        payload
            .body
            .clone()
            .ok_or_else(|| StepError::invalid_payload("either template or body is required"))
    }
}

impl<G, T> AutomationStep for SendSmsStep<G, T>
where
    G: IdempotencyLedger,
    T: TemplateRepository,
{
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, StepError> {
        let payload: SmsPayload =
            serde_json::from_value(ctx.event.payload.clone()).map_err(StepError::invalid_payload)?;
        if payload.to.trim().is_empty() {
            return Err(StepError::invalid_payload("to must not be empty"));
        }

        // Resolve everything fallible-but-cheap before claiming, so a bad
        // template name never consumes the event's claim.
        let body = self.resolve_body(ctx, &payload).await?;
        let connector = ctx
            .connector_with(|caps| caps.messaging)
            .ok_or_else(|| StepError::permanent("no connected platform supports messaging"))?;

        if !self.ledger.claim(&ctx.account_id, &ctx.event.event_id).await? {
            tracing::debug!(
                event_id = %ctx.event.event_id,
                "duplicate delivery; SMS already claimed"
            );
            return Ok(json!({ "sent": false, "duplicate": true }));
        }

        let message = OutboundMessage {
            to: payload.to,
            body,
        };
        match connector.send_message(&message).await {
            Ok(receipt) => Ok(json!({
                "sent": true,
                "provider_id": receipt.provider_id,
                "to": message.to,
            })),
            Err(e) => {
                if e.is_retryable() {
                    release_claim(&*self.ledger, ctx).await;
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{BoxConnector, Connector};
    use crate::ledger::MemoryLedger;
    use chrono::Utc;
    use driprail_types::account::AccountId;
    use driprail_types::connection::{ConnectionId, Platform};
    use driprail_types::connector::{ConnectorCapabilities, MessageReceipt, Tag};
    use driprail_types::error::{ConnectorError, RepositoryError};
    use driprail_types::template::MessageTemplate;
    use driprail_types::trigger::TriggerEvent;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;
    use uuid::Uuid;

    struct FakeSmsConnector {
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
        fail_status: Option<u16>,
    }

    impl FakeSmsConnector {
        fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                fail_status: None,
            }
        }

        fn failing(status: u16) -> Self {
            let mut fake = Self::new();
            fake.fail_status = Some(status);
            fake
        }
    }

    impl Connector for FakeSmsConnector {
        fn platform(&self) -> Platform {
            Platform::Twilio
        }

        fn capabilities(&self) -> ConnectorCapabilities {
            ConnectorCapabilities {
                messaging: true,
                ..Default::default()
            }
        }

        async fn get_tags(&self, _contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
            Err(ConnectorError::unsupported("tags"))
        }

        async fn send_message(
            &self,
            message: &OutboundMessage,
        ) -> Result<MessageReceipt, ConnectorError> {
            if let Some(status) = self.fail_status {
                return Err(ConnectorError::new(status, "twilio said no"));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(message.clone());
            Ok(MessageReceipt {
                provider_id: format!("SM{}", sent.len()),
            })
        }
    }

    /// Template store over a plain map; `fail` makes every lookup error.
    struct FakeTemplates {
        templates: Mutex<HashMap<String, MessageTemplate>>,
        fail: bool,
    }

    impl FakeTemplates {
        fn empty() -> Self {
            Self {
                templates: Mutex::new(HashMap::new()),
                fail: false,
            }
        }

        fn with(account_id: &AccountId, name: &str, body: &str) -> Self {
            let fake = Self::empty();
            let now = Utc::now();
            fake.templates.lock().unwrap().insert(
                name.to_string(),
                MessageTemplate {
                    id: Uuid::now_v7(),
                    account_id: account_id.clone(),
                    name: name.to_string(),
                    body: body.to_string(),
                    description: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            fake
        }

        fn failing() -> Self {
            let mut fake = Self::empty();
            fake.fail = true;
            fake
        }
    }

    impl TemplateRepository for FakeTemplates {
        async fn upsert(
            &self,
            template: &MessageTemplate,
        ) -> Result<MessageTemplate, RepositoryError> {
            self.templates
                .lock()
                .unwrap()
                .insert(template.name.clone(), template.clone());
            Ok(template.clone())
        }

        async fn get_by_name(
            &self,
            _account_id: &AccountId,
            name: &str,
        ) -> Result<Option<MessageTemplate>, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Query("template store offline".to_string()));
            }
            Ok(self.templates.lock().unwrap().get(name).cloned())
        }

        async fn list_by_account(
            &self,
            _account_id: &AccountId,
        ) -> Result<Vec<MessageTemplate>, RepositoryError> {
            Ok(self.templates.lock().unwrap().values().cloned().collect())
        }

        async fn delete(&self, _account_id: &AccountId, name: &str) -> Result<(), RepositoryError> {
            self.templates.lock().unwrap().remove(name);
            Ok(())
        }
    }

    fn ctx_with(connector: FakeSmsConnector, account_id: AccountId, payload: Value) -> ExecutionContext {
        let connection_id = ConnectionId::new();
        let event = TriggerEvent::new("send_sms", account_id)
            .with_payload(payload)
            .with_connections(vec![connection_id.clone()]);
        let mut connectors = HashMap::new();
        connectors.insert(connection_id, BoxConnector::new(connector));
        ExecutionContext::new(event, connectors, Instant::now() + Duration::from_secs(30))
    }

    fn step(
        templates: FakeTemplates,
    ) -> (SendSmsStep<MemoryLedger, FakeTemplates>, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        (
            SendSmsStep::new(Arc::clone(&ledger), Arc::new(templates)),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_send_with_inline_body() {
        let (step, _) = step(FakeTemplates::empty());
        let fake = FakeSmsConnector::new();
        let sent = Arc::clone(&fake.sent);
        let ctx = ctx_with(
            fake,
            AccountId::new(),
            json!({ "to": "+15550100", "body": "hello there" }),
        );

        let output = step.execute(&ctx).await.unwrap();

        assert_eq!(output["sent"], json!(true));
        assert_eq!(output["provider_id"], json!("SM1"));
        assert_eq!(sent.lock().unwrap()[0].body, "hello there");
    }

    #[tokio::test]
    async fn test_send_renders_template_with_variables() {
        let account_id = AccountId::new();
        let (step, _) = step(FakeTemplates::with(
            &account_id,
            "welcome",
            "Hi {{name}}, your code is {{code}}",
        ));
        let fake = FakeSmsConnector::new();
        let sent = Arc::clone(&fake.sent);
        let ctx = ctx_with(
            fake,
            account_id,
            json!({
                "to": "+15550100",
                "template": "welcome",
                "variables": { "name": "Ada", "code": 1234 },
            }),
        );

        step.execute(&ctx).await.unwrap();
        assert_eq!(sent.lock().unwrap()[0].body, "Hi Ada, your code is 1234");
    }

    #[tokio::test]
    async fn test_unknown_template_is_permanent() {
        let (step, ledger) = step(FakeTemplates::empty());
        let ctx = ctx_with(
            FakeSmsConnector::new(),
            AccountId::new(),
            json!({ "to": "+15550100", "template": "missing" }),
        );

        let err = step.execute(&ctx).await.unwrap_err();
        assert!(!err.is_retryable());
        // Resolution happens before the claim.
        assert!(
            ledger
                .claim(&ctx.account_id, &ctx.event.event_id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_template_store_failure_is_retryable() {
        let (step, _) = step(FakeTemplates::failing());
        let ctx = ctx_with(
            FakeSmsConnector::new(),
            AccountId::new(),
            json!({ "to": "+15550100", "template": "welcome" }),
        );

        let err = step.execute(&ctx).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_does_not_send_twice() {
        let (step, _) = step(FakeTemplates::empty());
        let fake = FakeSmsConnector::new();
        let sent = Arc::clone(&fake.sent);
        let ctx = ctx_with(
            fake,
            AccountId::new(),
            json!({ "to": "+15550100", "body": "only once" }),
        );

        let first = step.execute(&ctx).await.unwrap();
        assert_eq!(first["sent"], json!(true));

        let second = step.execute(&ctx).await.unwrap();
        assert_eq!(second["duplicate"], json!(true));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retryable_send_failure_releases_claim() {
        let (step, ledger) = step(FakeTemplates::empty());
        let ctx = ctx_with(
            FakeSmsConnector::failing(500),
            AccountId::new(),
            json!({ "to": "+15550100", "body": "hello" }),
        );

        let err = step.execute(&ctx).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(
            ledger
                .claim(&ctx.account_id, &ctx.event.event_id)
                .await
                .unwrap(),
            "claim must be free again after a retryable failure"
        );
    }

    #[tokio::test]
    async fn test_requires_template_or_body() {
        let (step, _) = step(FakeTemplates::empty());
        let ctx = ctx_with(
            FakeSmsConnector::new(),
            AccountId::new(),
            json!({ "to": "+15550100" }),
        );

        let err = step.execute(&ctx).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
