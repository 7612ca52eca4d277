//! # Routes
//!
//! Axum router configuration for the order service.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest webhook body accepted
pub const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

/// Create the main application router
///
/// Routes:
/// - GET  /health, GET / - Liveness
/// - GET  /health/ready - Readiness (order store health check)
/// - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    // Webhook routes (raw body, signature checked in the handler)
    let webhook_routes = Router::new()
        .route("/stripe", post(handlers::stripe_webhook))
        .layer(RequestBodyLimitLayer::new(WEBHOOK_BODY_LIMIT));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::readiness))
        .route("/", get(handlers::health))
        .nest("/webhook", webhook_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
