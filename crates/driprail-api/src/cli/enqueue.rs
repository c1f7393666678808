//! Direct event enqueue from the CLI, bypassing the HTTP API.
//!
//! Useful for smoke-testing steps and for cron-style drip scheduling from
//! the host the server runs on.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use driprail_core::queue::QueueSink;
use driprail_core::repository::account::AccountRepository;
use driprail_types::account::AccountId;
use driprail_types::connection::ConnectionId;
use driprail_types::trigger::TriggerEvent;

use crate::state::AppState;

/// Validate and enqueue one trigger event.
#[allow(clippy::too_many_arguments)]
pub async fn enqueue_event(
    state: &AppState,
    account: &str,
    step: &str,
    contact: Option<String>,
    payload: Option<String>,
    connections: &[String],
    delay_seconds: Option<u64>,
    json: bool,
) -> Result<()> {
    let account_id: AccountId = account
        .parse()
        .with_context(|| format!("invalid account id: '{account}'"))?;
    state
        .accounts
        .get_by_id(&account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account {account_id} not found"))?;

    if state.registry.resolve(step).is_none() {
        anyhow::bail!("unknown step kind '{step}'; run `drail steps` to list the registered kinds");
    }

    let payload = match payload {
        Some(raw) => serde_json::from_str(&raw).context("--payload is not valid JSON")?,
        None => serde_json::Value::Null,
    };

    let connections = connections
        .iter()
        .map(|c| {
            c.parse::<ConnectionId>()
                .with_context(|| format!("invalid connection id: '{c}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut event = TriggerEvent::new(step, account_id)
        .with_payload(payload)
        .with_connections(connections);
    if let Some(contact) = contact {
        event = event.with_contact(contact);
    }

    let message_id = match delay_seconds {
        Some(secs) => {
            state
                .queue
                .send_delayed(&event, Duration::from_secs(secs))
                .await?
        }
        None => state.queue.send(&event).await?,
    };

    if json {
        let out = serde_json::json!({
            "event_id": event.event_id,
            "message_id": message_id.0,
            "step_kind": event.step_kind,
            "delay_seconds": delay_seconds,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} Event enqueued!", style("✓").green().bold());
    println!();
    println!(
        "  {}  {}",
        style("Event:").bold(),
        style(event.event_id.to_string()).dim()
    );
    println!(
        "  {}  {}",
        style("Step:").bold(),
        style(&event.step_kind).cyan()
    );
    println!("  {}  {}", style("Message:").bold(), message_id.0);
    if let Some(secs) = delay_seconds {
        println!("  {}  in {}s", style("Due:").bold(), secs);
    }
    println!();

    Ok(())
}
