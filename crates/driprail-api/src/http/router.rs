//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.
//!
//! Every route except `/health` and hook ingestion requires an API key;
//! ingestion authenticates each delivery by HMAC signature instead.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Trigger events (producer edge of the queue)
        .route("/events", post(handlers::event::create_event))
        // Step kinds
        .route("/steps", get(handlers::steps::list_steps))
        // Connections CRUD
        .route("/connections", post(handlers::connection::create_connection))
        .route("/connections", get(handlers::connection::list_connections))
        .route("/connections/{id}", get(handlers::connection::get_connection))
        .route(
            "/connections/{id}",
            delete(handlers::connection::delete_connection),
        )
        // Templates CRUD
        .route("/templates", get(handlers::template::list_templates))
        .route("/templates/{name}", put(handlers::template::upsert_template))
        .route("/templates/{name}", get(handlers::template::get_template))
        .route(
            "/templates/{name}",
            delete(handlers::template::delete_template),
        )
        // Hook registration
        .route("/hooks", post(handlers::hook::create_hook))
        .route("/hooks", get(handlers::hook::list_hooks))
        .route("/hooks/{name}", delete(handlers::hook::delete_hook))
        // Hook ingestion (public; HMAC-verified per delivery)
        .route("/hooks/{name}", post(handlers::hook::receive_hook));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
