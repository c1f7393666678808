//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use driprail_types::error::{ConnectorError, QueueError, RepositoryError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Repository/storage errors.
    Repository(RepositoryError),
    /// Queue transport errors.
    Queue(QueueError),
    /// Connector and loader errors; the carried status passes through verbatim.
    Connector(ConnectorError),
    /// Authentication failure.
    Unauthorized(String),
    /// Ownership or credential-state rejection.
    Forbidden(String),
    /// Validation error.
    Validation(String),
    /// Resource lookup miss with a caller-facing message.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        AppError::Queue(e)
    }
}

impl From<ConnectorError> for AppError {
    fn from(e: ConnectorError) -> Self {
        AppError::Connector(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found".to_string())
            }
            AppError::Repository(RepositoryError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::Repository(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string())
            }
            AppError::Queue(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "QUEUE_ERROR", e.to_string())
            }
            AppError::Connector(e) => {
                // The loader/connector status is part of the contract and is
                // carried verbatim to the caller.
                let status = StatusCode::from_u16(e.status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, "CONNECTOR_ERROR", e.message.clone())
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_status_passes_through_verbatim() {
        for status in [403u16, 404, 422, 429, 501, 502] {
            let err = AppError::Connector(ConnectorError::new(status, "upstream said no"));
            let response = err.into_response();
            assert_eq!(response.status().as_u16(), status);
        }
    }

    #[test]
    fn test_repository_not_found_is_404() {
        let response = AppError::Repository(RepositoryError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_repository_conflict_is_409() {
        let err = AppError::Repository(RepositoryError::Conflict("name taken".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_forbidden_is_403() {
        let err = AppError::Forbidden("connection belongs to a different account".to_string());
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_queue_error_is_500() {
        let err = AppError::Queue(QueueError::Storage("disk full".to_string()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
