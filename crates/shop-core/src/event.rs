//! # Webhook Events
//!
//! Provider-neutral representation of a verified payment webhook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types that trigger processing. Everything else is acknowledged
/// without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Checkout session paid; materialize the order
    CheckoutCompleted,
    /// Delayed payment method failed after checkout
    CheckoutAsyncPaymentFailed,
    /// A charge attempt failed
    ChargeFailed,
    /// Not on the allow-list (passthrough)
    Ignored(String),
}

impl WebhookEventType {
    pub fn is_ignored(&self) -> bool {
        matches!(self, WebhookEventType::Ignored(_))
    }
}

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// The event's `data.object`
    pub object: serde_json::Map<String, serde_json::Value>,

    /// When the provider created the event
    pub created: DateTime<Utc>,
}
