//! Trigger-event enqueue handler: the producer edge of the queue.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::Json;

use driprail_core::queue::QueueSink;
use driprail_observe::queue_attrs::{DRIPRAIL_EVENT_ID, DRIPRAIL_STEP_KIND, MESSAGING_MESSAGE_ID};
use driprail_types::trigger::{CreateEventRequest, TriggerEvent};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/events - Validate and enqueue a trigger event.
///
/// The server stamps `event_id`, `occurred_at`, and the account from the
/// API key. Unknown step kinds are rejected here so the queue only ever
/// carries kinds the registry can resolve.
pub async fn create_event(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(body): Json<CreateEventRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    if state.registry.resolve(&body.step_kind).is_none() {
        return Err(AppError::Validation(format!(
            "unknown step kind '{}'; GET /api/v1/steps lists the registered kinds",
            body.step_kind
        )));
    }

    let mut event = TriggerEvent::new(body.step_kind, auth.account_id)
        .with_payload(body.payload)
        .with_connections(body.connections);
    if let Some(contact_id) = body.contact_id {
        event = event.with_contact(contact_id);
    }

    let message_id = match body.delay_seconds {
        Some(secs) => {
            state
                .queue
                .send_delayed(&event, Duration::from_secs(secs))
                .await?
        }
        None => state.queue.send(&event).await?,
    };

    tracing::info!(
        { MESSAGING_MESSAGE_ID } = message_id.0,
        { DRIPRAIL_EVENT_ID } = %event.event_id,
        { DRIPRAIL_STEP_KIND } = %event.step_kind,
        delay_seconds = body.delay_seconds,
        "trigger event enqueued"
    );

    let elapsed = start.elapsed().as_millis() as u64;
    let data = serde_json::json!({
        "event_id": event.event_id,
        "message_id": message_id.0,
        "step_kind": event.step_kind,
        "occurred_at": event.occurred_at,
        "delay_seconds": body.delay_seconds,
    });
    let resp = ApiResponse::success(data, request_id, elapsed).with_link("self", "/api/v1/events");

    Ok(Json(resp))
}
