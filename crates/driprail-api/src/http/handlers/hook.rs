//! Inbound-hook handlers: registration CRUD plus the public ingestion
//! endpoint.
//!
//! External systems POST signed payloads to `/hooks/{name}`; a verified
//! delivery becomes one queued trigger event for the hook's step kind.
//! Registration endpoints require an API key, ingestion authenticates by
//! HMAC-SHA256 signature alone.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use driprail_core::queue::QueueSink;
use driprail_core::repository::hook::HookRepository;
use driprail_infra::hooks::verify_hmac_sha256_with_prefix;
use driprail_observe::queue_attrs::{DRIPRAIL_EVENT_ID, DRIPRAIL_STEP_KIND, MESSAGING_MESSAGE_ID};
use driprail_types::hook::{CreateHookRequest, Hook};
use driprail_types::trigger::TriggerEvent;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/hooks - Register an inbound hook.
pub async fn create_hook(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(body): Json<CreateHookRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    validate_hook_name(&body.name)?;
    if state.registry.resolve(&body.step_kind).is_none() {
        return Err(AppError::Validation(format!(
            "unknown step kind '{}'; GET /api/v1/steps lists the registered kinds",
            body.step_kind
        )));
    }
    if body.secret.len() < 16 {
        return Err(AppError::Validation(
            "hook secret must be at least 16 characters".to_string(),
        ));
    }

    let hook = Hook {
        id: Uuid::now_v7(),
        account_id: auth.account_id,
        name: body.name,
        step_kind: body.step_kind,
        connections: body.connections,
        secret: body.secret,
        created_at: Utc::now(),
    };

    // Name collisions across accounts surface as 409: names are globally
    // unique because they form the public URL path.
    let stored = state.hooks.create(&hook).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(hook = %stored.name, step_kind = %stored.step_kind, "hook registered");

    // Hook serialization skips the secret.
    let stored_json = serde_json::to_value(&stored).unwrap();
    let resp = ApiResponse::success(stored_json, request_id, elapsed)
        .with_link("ingest", &format!("/api/v1/hooks/{}", stored.name));

    Ok(Json(resp))
}

/// GET /api/v1/hooks - List the caller's hooks.
pub async fn list_hooks(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let hooks = state.hooks.list_by_account(&auth.account_id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let hooks_json: Vec<serde_json::Value> = hooks
        .iter()
        .map(|h| serde_json::to_value(h).unwrap())
        .collect();

    let resp =
        ApiResponse::success(hooks_json, request_id, elapsed).with_link("self", "/api/v1/hooks");

    Ok(Json(resp))
}

/// DELETE /api/v1/hooks/:name - Delete a hook registration.
pub async fn delete_hook(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let hook = state
        .hooks
        .get_by_name(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("hook '{name}' not found")))?;

    if hook.account_id != auth.account_id {
        return Err(AppError::Forbidden(
            "hook belongs to a different account".to_string(),
        ));
    }

    state.hooks.delete(&hook.id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(hook = %name, "hook deleted");

    let data = serde_json::json!({ "deleted": name });
    let resp = ApiResponse::success(data, request_id, elapsed);

    Ok(Json(resp))
}

/// POST /api/v1/hooks/:name - Receive an inbound hook delivery.
///
/// Verifies the HMAC-SHA256 signature (from `X-Driprail-Signature` or the
/// GitHub-style `X-Hub-Signature-256`) over the raw body, then enqueues one
/// trigger event for the hook's step kind. The body is parsed as JSON
/// best-effort; a non-JSON body becomes a null payload. A top-level
/// `contact_id` string in the payload is lifted onto the event.
pub async fn receive_hook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let hook = state
        .hooks
        .get_by_name(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("hook '{name}' not found")))?;

    let signature = headers
        .get("x-driprail-signature")
        .or_else(|| headers.get("x-hub-signature-256"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing signature header".to_string()))?;

    verify_hmac_sha256_with_prefix(hook.secret.as_bytes(), &body, signature)
        .map_err(|_| AppError::Unauthorized("hook signature verification failed".to_string()))?;

    // Parse the body as JSON (best-effort; raw bytes become null if not valid JSON)
    let payload: serde_json::Value =
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let contact_id = payload
        .get("contact_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let mut event = TriggerEvent::new(hook.step_kind.clone(), hook.account_id.clone())
        .with_payload(payload)
        .with_connections(hook.connections.clone());
    if let Some(contact_id) = contact_id {
        event = event.with_contact(contact_id);
    }

    let message_id = state.queue.send(&event).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(
        { MESSAGING_MESSAGE_ID } = message_id.0,
        { DRIPRAIL_EVENT_ID } = %event.event_id,
        { DRIPRAIL_STEP_KIND } = %event.step_kind,
        hook = %name,
        "hook delivery enqueued"
    );

    let data = serde_json::json!({
        "event_id": event.event_id,
        "message_id": message_id.0,
        "hook": name,
    });
    let resp = ApiResponse::success(data, request_id, elapsed);

    Ok(Json(resp))
}

/// Hook names form public URL segments; keep them URL-safe.
fn validate_hook_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > 128 {
        return Err(AppError::Validation(
            "hook name must be 1-128 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(format!(
            "invalid hook name '{name}': use letters, digits, '-', '_'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hook_name() {
        assert!(validate_hook_name("form-submitted").is_ok());
        assert!(validate_hook_name("crm_sync_2").is_ok());
        assert!(validate_hook_name("").is_err());
        assert!(validate_hook_name("a/b").is_err());
        assert!(validate_hook_name("no spaces").is_err());
    }
}
