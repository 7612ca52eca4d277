//! # shop-stripe
//!
//! Stripe webhook support for the storefront.
//!
//! - **Signature verification**: `Stripe-Signature` HMAC-SHA256 check with a
//!   timestamp tolerance window
//! - **Event parsing**: checkout sessions and charges into typed data,
//!   including the `userId` / `cartItems` / `locale` checkout metadata
//! - **Dispatch**: allow-listed event types routed to a `WebhookHandler`
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use shop_stripe::{dispatch_webhook_event, StripeWebhookVerifier, WebhookHandler};
//!
//! struct Fulfillment;
//!
//! #[async_trait]
//! impl WebhookHandler for Fulfillment {
//!     async fn on_checkout_completed(&self, data: CheckoutSessionData) -> ShopResult<WebhookOutcome> {
//!         let request = data.order_request()?;
//!         // write the order
//!         Ok(WebhookOutcome::Processed)
//!     }
//! }
//!
//! // In your webhook endpoint:
//! let event = verifier.verify(&body, signature)?;
//! dispatch_webhook_event(&Fulfillment, event).await?;
//! ```

pub mod config;
pub mod signature;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use signature::{signature_header, verify_signature};
pub use webhook::{
    dispatch_webhook_event, ChargeData, CheckoutSessionData, LoggingWebhookHandler,
    StripeWebhookVerifier, WebhookHandler, WebhookOutcome, PROCESSED_EVENT_TYPES,
};
