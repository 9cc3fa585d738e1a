use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status of a subscribe/unsubscribe call on the ingest control surface.
///
/// Duplicate subscriptions and absent unsubscriptions are definite statuses,
/// never errors.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    /// One of `subscription_added`, `already_subscribed`,
    /// `subscription_removed`, `not_subscribed`
    pub status: String,
    pub symbol: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Live upstream exchange streams
    pub ingest_streams: usize,
    /// Connected clients
    pub clients: usize,
}
