//! Axum router construction.

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{handlers, middleware::Limits, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState, limits: Limits) -> Router {
    Router::new()
        .route(
            "/assets/:name",
            get(handlers::download).post(handlers::upload),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(limits.max_upload_bytes))
        .with_state(state)
}
