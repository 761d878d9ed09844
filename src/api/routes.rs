use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

/// Build the prediction API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(handlers::health_check))
        .route("/health/live", get(handlers::live))
        .route("/health/ready", get(handlers::ready))
        // Scoring
        .route("/predict", post(handlers::predict))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
}
