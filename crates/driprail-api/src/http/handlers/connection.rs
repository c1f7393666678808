//! Platform-connection CRUD handlers.
//!
//! Credentials enter through `POST /connections`, are encrypted by the
//! repository before they touch storage, and are never serialized back out.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use driprail_core::repository::connection::ConnectionRepository;
use driprail_types::connection::{
    Connection, ConnectionId, ConnectionStatus, CreateConnectionRequest,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/connections - Register a platform connection.
pub async fn create_connection(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(body): Json<CreateConnectionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    if body.display_name.trim().is_empty() {
        return Err(AppError::Validation(
            "display_name must not be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let connection = Connection {
        id: ConnectionId::new(),
        account_id: auth.account_id,
        platform: body.platform,
        display_name: body.display_name.trim().to_string(),
        status: ConnectionStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let stored = state
        .connections
        .create(&connection, &body.credentials)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(
        connection_id = %stored.id,
        platform = %stored.platform,
        "connection registered"
    );

    let stored_json = serde_json::to_value(&stored).unwrap();
    let resp = ApiResponse::success(stored_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/connections/{}", stored.id));

    Ok(Json(resp))
}

/// GET /api/v1/connections - List the caller's connections.
pub async fn list_connections(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let connections = state.connections.list_by_account(&auth.account_id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let connections_json: Vec<serde_json::Value> = connections
        .iter()
        .map(|c| serde_json::to_value(c).unwrap())
        .collect();

    let resp = ApiResponse::success(connections_json, request_id, elapsed)
        .with_link("self", "/api/v1/connections");

    Ok(Json(resp))
}

/// GET /api/v1/connections/:id - Get one connection (never its credentials).
pub async fn get_connection(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let connection = find_owned(&state, &auth.account_id, &id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let connection_json = serde_json::to_value(&connection).unwrap();
    let resp = ApiResponse::success(connection_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/connections/{}", connection.id));

    Ok(Json(resp))
}

/// DELETE /api/v1/connections/:id - Delete a connection and its credentials.
pub async fn delete_connection(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let connection = find_owned(&state, &auth.account_id, &id).await?;
    state.connections.delete(&connection.id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(connection_id = %connection.id, "connection deleted");

    let data = serde_json::json!({ "deleted": connection.id });
    let resp = ApiResponse::success(data, request_id, elapsed);

    Ok(Json(resp))
}

/// Resolve a connection id and enforce account ownership.
///
/// A connection that exists but belongs to a different account is a 403,
/// not a 404: the id is valid, the caller just does not own it.
async fn find_owned(
    state: &AppState,
    account_id: &driprail_types::account::AccountId,
    id: &str,
) -> Result<Connection, AppError> {
    let id: ConnectionId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid connection id: '{id}'")))?;

    let connection = state
        .connections
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("connection {id} not found")))?;

    if connection.account_id != *account_id {
        return Err(AppError::Forbidden(
            "connection belongs to a different account".to_string(),
        ));
    }

    Ok(connection)
}
