use axum::{routing::get, Router};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{self, AppState};
use super::openapi::ApiDoc;
use super::ws;

/// Create the router: ingest control surface, portfolio WebSocket endpoint,
/// health check and Swagger UI.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Ingest control surface
        .route(
            "/coin",
            get(handlers::subscribe_coin).delete(handlers::unsubscribe_coin),
        )
        // Client-facing portfolio stream
        .route("/ws", get(ws::portfolio_ws_handler))
        // Health
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
