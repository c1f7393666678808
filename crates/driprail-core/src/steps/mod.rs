//! Built-in automation steps.
//!
//! Each step is a small, stateless-or-Arc-shared unit registered under a
//! stable kind string. Steps that cause effects without a natural key (SMS,
//! row appends, webhooks) claim the event in the idempotency ledger before
//! acting; steps whose target state is observable (tags) or keyed (field
//! upserts) skip the ledger and check or rely on the platform instead.

mod record;
mod sms;
mod tag;
mod webhook;

pub use record::{AppendRowStep, UpdateFieldStep};
pub use sms::SendSmsStep;
pub use tag::{TagContactStep, UntagContactStep};
pub use webhook::{PostWebhookStep, WebhookPoster};

use std::sync::Arc;

use driprail_types::error::RegistryError;

use crate::context::ExecutionContext;
use crate::ledger::IdempotencyLedger;
use crate::registry::StepRegistry;
use crate::repository::template::TemplateRepository;
use crate::step::BoxStep;

/// Register every built-in step. Called once at startup, before the registry
/// is frozen behind an `Arc`; a duplicate kind here is a programming error
/// and fails startup.
pub fn register_all<G, T, P>(
    registry: &mut StepRegistry,
    ledger: Arc<G>,
    templates: Arc<T>,
    poster: Arc<P>,
) -> Result<(), RegistryError>
where
    G: IdempotencyLedger + 'static,
    T: TemplateRepository + 'static,
    P: WebhookPoster + 'static,
{
    registry.register(
        TagContactStep::KIND,
        Box::new(|| BoxStep::new(TagContactStep)),
    )?;
    registry.register(
        UntagContactStep::KIND,
        Box::new(|| BoxStep::new(UntagContactStep)),
    )?;
    registry.register(
        UpdateFieldStep::KIND,
        Box::new(|| BoxStep::new(UpdateFieldStep)),
    )?;

    {
        let ledger = Arc::clone(&ledger);
        registry.register(
            AppendRowStep::<G>::KIND,
            Box::new(move || BoxStep::new(AppendRowStep::new(Arc::clone(&ledger)))),
        )?;
    }

    {
        let ledger = Arc::clone(&ledger);
        registry.register(
            SendSmsStep::<G, T>::KIND,
            Box::new(move || {
                BoxStep::new(SendSmsStep::new(Arc::clone(&ledger), Arc::clone(&templates)))
            }),
        )?;
    }

    registry.register(
        PostWebhookStep::<G, P>::KIND,
        Box::new(move || {
            BoxStep::new(PostWebhookStep::new(Arc::clone(&ledger), Arc::clone(&poster)))
        }),
    )?;

    Ok(())
}

/// Give an idempotency claim back after a retryable failure so redelivery
/// can try the effect again. Release failures are logged, not propagated;
/// the sweep reclaims stuck entries eventually.
pub(crate) async fn release_claim<G: IdempotencyLedger>(ledger: &G, ctx: &ExecutionContext) {
    if let Err(e) = ledger
        .release(&ctx.account_id, &ctx.event.event_id)
        .await
    {
        tracing::warn!(
            event_id = %ctx.event.event_id,
            error = %e,
            "failed to release idempotency claim"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driprail_types::error::ConnectorError;
    use serde_json::Value;

    struct NullPoster;

    impl WebhookPoster for NullPoster {
        async fn post(&self, _url: &str, _body: &Value) -> Result<u16, ConnectorError> {
            Ok(200)
        }
    }

    struct NullTemplates;

    impl TemplateRepository for NullTemplates {
        async fn upsert(
            &self,
            template: &driprail_types::template::MessageTemplate,
        ) -> Result<driprail_types::template::MessageTemplate, driprail_types::error::RepositoryError>
        {
            Ok(template.clone())
        }

        async fn get_by_name(
            &self,
            _account_id: &driprail_types::account::AccountId,
            _name: &str,
        ) -> Result<
            Option<driprail_types::template::MessageTemplate>,
            driprail_types::error::RepositoryError,
        > {
            Ok(None)
        }

        async fn list_by_account(
            &self,
            _account_id: &driprail_types::account::AccountId,
        ) -> Result<
            Vec<driprail_types::template::MessageTemplate>,
            driprail_types::error::RepositoryError,
        > {
            Ok(vec![])
        }

        async fn delete(
            &self,
            _account_id: &driprail_types::account::AccountId,
            _name: &str,
        ) -> Result<(), driprail_types::error::RepositoryError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_all_registers_every_builtin() {
        let mut registry = StepRegistry::new();
        register_all(
            &mut registry,
            Arc::new(crate::ledger::MemoryLedger::new()),
            Arc::new(NullTemplates),
            Arc::new(NullPoster),
        )
        .unwrap();

        assert_eq!(
            registry.kinds(),
            vec![
                "append_row",
                "post_webhook",
                "send_sms",
                "tag_contact",
                "untag_contact",
                "update_field",
            ]
        );
    }

    #[test]
    fn test_register_all_twice_fails_fast() {
        let mut registry = StepRegistry::new();
        let ledger = Arc::new(crate::ledger::MemoryLedger::new());
        let templates = Arc::new(NullTemplates);
        let poster = Arc::new(NullPoster);

        register_all(
            &mut registry,
            Arc::clone(&ledger),
            Arc::clone(&templates),
            Arc::clone(&poster),
        )
        .unwrap();

        let err = register_all(&mut registry, ledger, templates, poster).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }
}
