//! HTTP API route definitions.

use axum::{http::StatusCode, middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health, log_request, metrics, prometheus, root, version, AppState};

/// Create the router for one listener from its route table.
pub fn create_router(state: AppState) -> Router {
    let role = state.role;
    let spec = role.spec();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    if spec.version_enabled {
        router = router.route("/version", get(version));
    }

    if spec.metrics_enabled {
        router = router
            .route("/metrics", get(metrics))
            .route("/metrics/prometheus", get(prometheus));
    }

    // both fallbacks go before the layers so unmatched requests are logged too;
    // the method fallback only covers routes registered above it
    router
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(role, log_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
