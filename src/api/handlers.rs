use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::AppConfig;
use crate::fanout::ConnectionRegistry;
use crate::muxer::{IngestMultiplexer, SubscribeOutcome, UnsubscribeOutcome};
use crate::profiles::ProfileStore;

use super::responses::*;

/// Shared application state behind every route.
pub struct AppState {
    pub ingest: IngestMultiplexer,
    pub registry: Arc<ConnectionRegistry>,
    pub profiles: Arc<dyn ProfileStore>,
    pub config: AppConfig,
    /// Shutdown root; client connection tokens are derived from it
    pub shutdown: CancellationToken,
    /// Tracker for the per-connection writer tasks
    pub tracker: TaskTracker,
}

/// Query parameters for the ingest control surface. Both are required, but
/// modeled optional so a missing one yields the surface's own 400 body.
#[derive(Debug, Deserialize)]
pub struct CoinQuery {
    pub symbol: Option<String>,
    pub id: Option<String>,
}

fn missing_params() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "symbol and id query parameters are required".to_string(),
        }),
    )
        .into_response()
}

/// Subscribe a user to a symbol's upstream stream
#[utoipa::path(
    get,
    path = "/coin",
    tag = "Subscriptions",
    params(
        ("symbol" = String, Query, description = "Symbol, case-insensitive"),
        ("id" = String, Query, description = "Subscriber identity")
    ),
    responses(
        (status = 200, description = "Definite subscription status", body = SubscriptionResponse),
        (status = 400, description = "Missing query parameters", body = ErrorResponse)
    )
)]
pub async fn subscribe_coin(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoinQuery>,
) -> Response {
    let (Some(symbol), Some(id)) = (query.symbol, query.id) else {
        return missing_params();
    };

    let status = match state.ingest.add_subscriber(&symbol, &id) {
        SubscribeOutcome::Started | SubscribeOutcome::Added => "subscription_added",
        SubscribeOutcome::AlreadySubscribed => "already_subscribed",
    };

    Json(SubscriptionResponse {
        status: status.to_string(),
        symbol: symbol.to_lowercase(),
        user_id: id,
    })
    .into_response()
}

/// Unsubscribe a user from a symbol's upstream stream
#[utoipa::path(
    delete,
    path = "/coin",
    tag = "Subscriptions",
    params(
        ("symbol" = String, Query, description = "Symbol, case-insensitive"),
        ("id" = String, Query, description = "Subscriber identity")
    ),
    responses(
        (status = 200, description = "Definite unsubscription status", body = SubscriptionResponse),
        (status = 400, description = "Missing query parameters", body = ErrorResponse)
    )
)]
pub async fn unsubscribe_coin(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoinQuery>,
) -> Response {
    let (Some(symbol), Some(id)) = (query.symbol, query.id) else {
        return missing_params();
    };

    let status = match state.ingest.remove_subscriber(&symbol, &id) {
        UnsubscribeOutcome::Stopped | UnsubscribeOutcome::Removed => "subscription_removed",
        UnsubscribeOutcome::NotFound => "not_subscribed",
    };

    Json(SubscriptionResponse {
        status: status.to_string(),
        symbol: symbol.to_lowercase(),
        user_id: id,
    })
    .into_response()
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        ingest_streams: state.ingest.stats().active_streams,
        clients: state.registry.len(),
    })
}
