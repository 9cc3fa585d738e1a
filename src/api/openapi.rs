use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::*;

/// OpenAPI specification for the control surface
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coin Stream API",
        version = "1.0.0",
        description = "Live crypto market data distribution: demand-driven stream \
                       multiplexing, windowed sampling, and portfolio push"
    ),
    paths(
        handlers::health_check,
        handlers::subscribe_coin,
        handlers::unsubscribe_coin,
    ),
    components(
        schemas(
            SubscriptionResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Subscriptions", description = "Ingest control surface"),
    )
)]
pub struct ApiDoc;
