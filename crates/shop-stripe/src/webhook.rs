//! # Stripe Webhook Handling
//!
//! Verifies incoming webhooks, parses them into typed event data and routes
//! them to a [`WebhookHandler`]. Only the event types in
//! [`PROCESSED_EVENT_TYPES`] reach the handler's processing methods; every
//! other type is acknowledged through `on_ignored_event`.

use crate::config::StripeConfig;
use crate::signature::verify_signature;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use shop_core::{
    amount_from_cents, CartItem, CheckoutOrderRequest, CustomerContact, Locale, ShopError,
    ShopResult, WebhookEvent, WebhookEventType,
};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Metadata keys written when the checkout session is created
pub const METADATA_USER_ID: &str = "userId";
pub const METADATA_CART_ITEMS: &str = "cartItems";
pub const METADATA_LOCALE: &str = "locale";

/// Stripe event types that trigger processing
pub const PROCESSED_EVENT_TYPES: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.async_payment_failed",
    "charge.failed",
];

/// Map a Stripe event type onto the allow-list
pub fn event_type_from_stripe(name: &str) -> WebhookEventType {
    match name {
        "checkout.session.completed" => WebhookEventType::CheckoutCompleted,
        "checkout.session.async_payment_failed" => WebhookEventType::CheckoutAsyncPaymentFailed,
        "charge.failed" => WebhookEventType::ChargeFailed,
        other => WebhookEventType::Ignored(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Map<String, Value>,
}

/// Verifies `Stripe-Signature` and turns raw bodies into [`WebhookEvent`]s
#[derive(Debug, Clone)]
pub struct StripeWebhookVerifier {
    config: StripeConfig,
}

impl StripeWebhookVerifier {
    pub fn new(config: StripeConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Verify against the current time
    pub fn verify(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }

    /// Verify the signature, then parse the event
    #[instrument(skip(self, payload, signature))]
    pub fn verify_at(&self, payload: &[u8], signature: &str, now: i64) -> ShopResult<WebhookEvent> {
        let secret = self.config.require_secret()?;
        verify_signature(secret, payload, signature, self.config.tolerance_secs, now)?;

        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            ShopError::PayloadParse(format!("Failed to parse webhook: {}", e))
        })?;

        debug!(event_id = %event.id, event_type = %event.event_type, "Verified Stripe webhook");

        Ok(WebhookEvent {
            event_id: event.id,
            event_type: event_type_from_stripe(&event.event_type),
            provider: "stripe".to_string(),
            object: event.data.object,
            created: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
        })
    }
}

/// Read a field that Stripe sends either as an id string or an expanded object
fn id_or_expanded(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn nested_str(obj: &Map<String, Value>, parent: &str, key: &str) -> Option<String> {
    obj.get(parent)
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(String::from)
}

fn string_metadata(obj: &Map<String, Value>) -> HashMap<String, String> {
    obj.get("metadata")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Parsed checkout session (`checkout.session.*` events)
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    pub session_id: String,
    pub amount_total: Option<i64>,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub payment_status: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionData {
    /// Parse from a webhook event
    pub fn from_event(event: &WebhookEvent) -> ShopResult<Self> {
        let obj = &event.object;

        let session_id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ShopError::PayloadParse("Missing session id".to_string()))?;

        let customer_email = nested_str(obj, "customer_details", "email").or_else(|| {
            obj.get("customer_email")
                .and_then(Value::as_str)
                .map(String::from)
        });

        Ok(Self {
            session_id,
            amount_total: obj.get("amount_total").and_then(Value::as_i64),
            payment_intent_id: id_or_expanded(obj.get("payment_intent")),
            customer_id: id_or_expanded(obj.get("customer")),
            customer_name: nested_str(obj, "customer_details", "name"),
            customer_email,
            payment_status: obj
                .get("payment_status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            metadata: string_metadata(obj),
        })
    }

    /// Check if payment was successful
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_USER_ID)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Locale recorded at checkout, or the default
    pub fn locale(&self) -> Locale {
        Locale::resolve(self.metadata.get(METADATA_LOCALE).map(String::as_str))
    }

    /// Name and email Stripe collected, when both are present
    pub fn customer_contact(&self) -> Option<CustomerContact> {
        CustomerContact::from_provider(
            self.customer_name.as_deref(),
            self.customer_email.as_deref(),
        )
    }

    /// Validate the fields an order needs.
    ///
    /// Missing fields are reported together; cart parsing follows
    /// [`CartItem::parse_list`].
    pub fn order_request(&self) -> ShopResult<CheckoutOrderRequest> {
        let user_id = self.user_id();
        let cart_items = self
            .metadata
            .get(METADATA_CART_ITEMS)
            .filter(|s| !s.is_empty());
        let payment_intent_id = self.payment_intent_id.as_deref().filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if user_id.is_none() {
            missing.push(METADATA_USER_ID);
        }
        if cart_items.is_none() {
            missing.push(METADATA_CART_ITEMS);
        }
        if self.amount_total.is_none() {
            missing.push("amount_total");
        }
        if payment_intent_id.is_none() {
            missing.push("payment_intent");
        }

        match (user_id, cart_items, self.amount_total, payment_intent_id) {
            (Some(user_id), Some(cart_items), Some(amount_total), Some(payment_intent_id)) => {
                Ok(CheckoutOrderRequest {
                    checkout_session_id: self.session_id.clone(),
                    user_id: user_id.to_string(),
                    items: CartItem::parse_list(cart_items)?,
                    amount_total_cents: amount_total,
                    payment_intent_id: payment_intent_id.to_string(),
                    customer_id: self.customer_id.clone(),
                })
            }
            _ => Err(ShopError::MissingSessionData(missing.join(", "))),
        }
    }
}

/// Parsed charge (`charge.*` events)
#[derive(Debug, Clone)]
pub struct ChargeData {
    pub charge_id: String,
    pub amount: Option<i64>,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub failure_message: Option<String>,
    pub failure_code: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl ChargeData {
    /// Parse from a webhook event
    pub fn from_event(event: &WebhookEvent) -> ShopResult<Self> {
        let obj = &event.object;

        let charge_id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ShopError::PayloadParse("Missing charge id".to_string()))?;

        let billing_email = nested_str(obj, "billing_details", "email").or_else(|| {
            obj.get("receipt_email")
                .and_then(Value::as_str)
                .map(String::from)
        });

        Ok(Self {
            charge_id,
            amount: obj.get("amount").and_then(Value::as_i64),
            payment_intent_id: id_or_expanded(obj.get("payment_intent")),
            customer_id: id_or_expanded(obj.get("customer")),
            billing_name: nested_str(obj, "billing_details", "name"),
            billing_email,
            failure_message: obj
                .get("failure_message")
                .and_then(Value::as_str)
                .map(String::from),
            failure_code: obj
                .get("failure_code")
                .and_then(Value::as_str)
                .map(String::from),
            metadata: string_metadata(obj),
        })
    }

    /// Human-readable reason for the failure
    pub fn failure_reason(&self) -> String {
        self.failure_message
            .clone()
            .or_else(|| self.failure_code.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_USER_ID)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn customer_contact(&self) -> Option<CustomerContact> {
        CustomerContact::from_provider(self.billing_name.as_deref(), self.billing_email.as_deref())
    }

    /// Attempted amount in dollars
    pub fn amount_decimal(&self) -> Option<Decimal> {
        self.amount.map(amount_from_cents)
    }
}

/// What processing did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Side effects performed
    Processed,
    /// Already processed earlier; nothing done
    Replayed,
    /// Not on the allow-list
    Ignored,
}

/// Webhook event handler trait
///
/// Implement this trait to handle the processed event types. Defaults only log.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Called when a checkout session is completed
    async fn on_checkout_completed(&self, data: CheckoutSessionData) -> ShopResult<WebhookOutcome> {
        info!(
            session_id = %data.session_id,
            amount_total = ?data.amount_total,
            "Checkout completed"
        );
        Ok(WebhookOutcome::Processed)
    }

    /// Called when a delayed checkout payment fails
    async fn on_checkout_payment_failed(
        &self,
        data: CheckoutSessionData,
    ) -> ShopResult<WebhookOutcome> {
        warn!(session_id = %data.session_id, "Checkout payment failed");
        Ok(WebhookOutcome::Processed)
    }

    /// Called when a charge fails
    async fn on_charge_failed(&self, data: ChargeData) -> ShopResult<WebhookOutcome> {
        warn!(charge_id = %data.charge_id, reason = %data.failure_reason(), "Charge failed");
        Ok(WebhookOutcome::Processed)
    }

    /// Called for events outside the allow-list
    async fn on_ignored_event(&self, event: &WebhookEvent) -> ShopResult<WebhookOutcome> {
        debug!(event_id = %event.event_id, event_type = ?event.event_type, "Unhandled webhook event");
        Ok(WebhookOutcome::Ignored)
    }
}

/// Default webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: WebhookEvent,
) -> ShopResult<WebhookOutcome> {
    match &event.event_type {
        WebhookEventType::CheckoutCompleted => {
            let data = CheckoutSessionData::from_event(&event)?;
            handler.on_checkout_completed(data).await
        }
        WebhookEventType::CheckoutAsyncPaymentFailed => {
            let data = CheckoutSessionData::from_event(&event)?;
            handler.on_checkout_payment_failed(data).await
        }
        WebhookEventType::ChargeFailed => {
            let data = ChargeData::from_event(&event)?;
            handler.on_charge_failed(data).await
        }
        WebhookEventType::Ignored(_) => handler.on_ignored_event(&event).await,
    }
}
