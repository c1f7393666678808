//! Message-template CRUD handlers.
//!
//! Templates are keyed by (account, name); the name rides in the URL so a
//! PUT is a natural upsert.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use driprail_core::repository::template::TemplateRepository;
use driprail_types::template::{MessageTemplate, UpsertTemplateRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// PUT /api/v1/templates/:name - Create or replace a template.
pub async fn upsert_template(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(name): Path<String>,
    Json(body): Json<UpsertTemplateRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    validate_template_name(&name)?;
    if body.body.is_empty() {
        return Err(AppError::Validation(
            "template body must not be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let template = MessageTemplate {
        id: Uuid::now_v7(),
        account_id: auth.account_id,
        name,
        body: body.body,
        description: body.description,
        created_at: now,
        updated_at: now,
    };

    // The repository preserves the original id and created_at when the
    // name already exists.
    let stored = state.templates.upsert(&template).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(template = %stored.name, "template upserted");

    let stored_json = serde_json::to_value(&stored).unwrap();
    let resp = ApiResponse::success(stored_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/templates/{}", stored.name));

    Ok(Json(resp))
}

/// GET /api/v1/templates - List the caller's templates, sorted by name.
pub async fn list_templates(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let templates = state.templates.list_by_account(&auth.account_id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let templates_json: Vec<serde_json::Value> = templates
        .iter()
        .map(|t| serde_json::to_value(t).unwrap())
        .collect();

    let resp = ApiResponse::success(templates_json, request_id, elapsed)
        .with_link("self", "/api/v1/templates");

    Ok(Json(resp))
}

/// GET /api/v1/templates/:name - Get one template.
pub async fn get_template(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let template = state
        .templates
        .get_by_name(&auth.account_id, &name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("template '{name}' not found")))?;
    let elapsed = start.elapsed().as_millis() as u64;

    let template_json = serde_json::to_value(&template).unwrap();
    let resp = ApiResponse::success(template_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/templates/{}", template.name));

    Ok(Json(resp))
}

/// DELETE /api/v1/templates/:name - Delete a template.
pub async fn delete_template(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    state.templates.delete(&auth.account_id, &name).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::info!(template = %name, "template deleted");

    let data = serde_json::json!({ "deleted": name });
    let resp = ApiResponse::success(data, request_id, elapsed);

    Ok(Json(resp))
}

/// Template names become lookup keys in step payloads and URL segments;
/// keep them to a URL-safe charset.
fn validate_template_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > 128 {
        return Err(AppError::Validation(
            "template name must be 1-128 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(format!(
            "invalid template name '{name}': use letters, digits, '-', '_'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_template_name_accepts_url_safe() {
        assert!(validate_template_name("welcome-sms").is_ok());
        assert!(validate_template_name("drip_2").is_ok());
    }

    #[test]
    fn test_validate_template_name_rejects_path_characters() {
        assert!(validate_template_name("").is_err());
        assert!(validate_template_name("a/b").is_err());
        assert!(validate_template_name("hello world").is_err());
        assert!(validate_template_name(&"x".repeat(200)).is_err());
    }
}
