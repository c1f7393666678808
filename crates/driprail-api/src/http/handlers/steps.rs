//! Step-kind listing handler.

use std::time::Instant;

use axum::extract::State;
use axum::Json;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/steps - List the registered step kinds.
///
/// The set is fixed at startup; producers use it to discover what
/// `step_kind` values `POST /events` accepts.
pub async fn list_steps(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let kinds = state.registry.kinds();
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({
        "kinds": kinds,
        "count": kinds.len(),
    });
    let resp = ApiResponse::success(data, request_id, elapsed).with_link("self", "/api/v1/steps");

    Ok(Json(resp))
}
