//! # Request Handlers
//!
//! Axum request handlers for the order service.
//!
//! Status codes double as Stripe's retry signal: 2xx acknowledges the event,
//! 4xx marks it as permanently unprocessable, 5xx asks Stripe to redeliver.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use shop_core::ShopError;
use shop_stripe::dispatch_webhook_event;
use tracing::{error, info, instrument, warn};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

// =============================================================================
// Response Types
// =============================================================================

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

fn shop_error_to_response(err: ShopError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-orders",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness: the order store must answer
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.store.backend_name();
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready", "store": backend })),
        ),
        Err(e) => {
            error!(store = backend, error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unavailable",
                    "store": backend,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, Json<ErrorResponse>)> {
    state.verifier.config().require_secret().map_err(|e| {
        error!("Webhook received but no signing secret is configured");
        shop_error_to_response(e)
    })?;

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            shop_error_to_response(ShopError::SignatureVerification(
                "Missing Stripe-Signature header".to_string(),
            ))
        })?;

    let event = state.verifier.verify(&body, signature).map_err(|e| {
        warn!(error = %e, "Webhook verification failed");
        shop_error_to_response(e)
    })?;

    let event_id = event.event_id.clone();
    info!(event_id = %event_id, event_type = ?event.event_type, "Received webhook");

    let outcome = dispatch_webhook_event(state.fulfillment.as_ref(), event)
        .await
        .map_err(|e| {
            if e.is_retryable() {
                error!(event_id = %event_id, error = %e, "Webhook processing failed");
            } else {
                warn!(event_id = %event_id, error = %e, "Webhook rejected");
            }
            shop_error_to_response(e)
        })?;

    info!(event_id = %event_id, ?outcome, "Webhook handled");
    Ok(Json(WebhookAck { received: true }))
}
