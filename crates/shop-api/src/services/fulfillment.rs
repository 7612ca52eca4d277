//! # Order Fulfillment
//!
//! [`WebhookHandler`] that turns verified Stripe events into orders and
//! customer notifications.
//!
//! ```text
//! checkout.session.completed
//!   validate metadata ──▶ existing order? ──yes──▶ Replayed
//!                               │ no
//!                               ▼
//!                 create order + items (one transaction)
//!                               │
//!                               ▼
//!               user lookup ──▶ confirmation email (fallback chain)
//! ```
//!
//! Payment failures only notify; nothing is written.

use crate::services::notifier::Notifier;
use async_trait::async_trait;
use chrono::Utc;
use shop_core::{
    contact_candidates, generate_display_id, BoxedEmailSender, BoxedOrderStore,
    BoxedUserDirectory, Locale, Materialized, NewOrder, ShopError, ShopResult, UserProfile,
    WebhookEvent,
};
use shop_stripe::{ChargeData, CheckoutSessionData, WebhookHandler, WebhookOutcome};
use tracing::{debug, info, instrument, warn};

/// Materializes paid checkouts and notifies customers
pub struct OrderFulfillment {
    store: BoxedOrderStore,
    users: BoxedUserDirectory,
    notifier: Notifier,
}

impl OrderFulfillment {
    pub fn new(store: BoxedOrderStore, email: BoxedEmailSender, users: BoxedUserDirectory) -> Self {
        Self {
            store,
            users,
            notifier: Notifier::new(email),
        }
    }

    /// Fetch the user a payment belongs to; lookup failures count as no user.
    async fn lookup_user(&self, user_id: Option<&str>) -> Option<UserProfile> {
        let user_id = user_id?;
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!(user_id, "User not found in directory");
                None
            }
            Err(e) => {
                warn!(user_id, error = %e, "User lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl WebhookHandler for OrderFulfillment {
    #[instrument(skip(self, data), fields(session_id = %data.session_id))]
    async fn on_checkout_completed(&self, data: CheckoutSessionData) -> ShopResult<WebhookOutcome> {
        let request = data.order_request()?;
        if !data.is_paid() {
            warn!(
                payment_status = %data.payment_status,
                "Checkout completed without a paid status"
            );
        }

        if let Some(existing) = self
            .store
            .find_by_checkout_session(&request.checkout_session_id)
            .await?
        {
            info!(
                order_id = %existing.id,
                display_id = %existing.display_id,
                "Order already exists for checkout session, skipping"
            );
            return Ok(WebhookOutcome::Replayed);
        }

        let display_id = generate_display_id(Utc::now(), &mut rand::thread_rng());
        let order = NewOrder::completed(&request, display_id);

        let details = match self
            .store
            .create_order(order)
            .await
            .map_err(|e| ShopError::OrderCreation(e.to_string()))?
        {
            Materialized::Created(details) => details,
            Materialized::AlreadyExists => {
                info!("Concurrent delivery already created this order");
                return Ok(WebhookOutcome::Replayed);
            }
        };

        info!(
            order_id = %details.order.id,
            display_id = %details.order.display_id,
            amount = %details.order.amount,
            items = details.lines.len(),
            "Order created"
        );

        let user = self.lookup_user(Some(request.user_id.as_str())).await;
        let candidates = contact_candidates(data.customer_contact(), user.as_ref());
        self.notifier
            .order_confirmed(candidates, &details, data.locale())
            .await;

        Ok(WebhookOutcome::Processed)
    }

    #[instrument(skip(self, data), fields(session_id = %data.session_id))]
    async fn on_checkout_payment_failed(
        &self,
        data: CheckoutSessionData,
    ) -> ShopResult<WebhookOutcome> {
        warn!("Delayed checkout payment failed");

        let user = self.lookup_user(data.user_id()).await;
        let candidates = contact_candidates(data.customer_contact(), user.as_ref());
        self.notifier
            .payment_failed(
                candidates,
                &data.session_id,
                data.amount_total.map(shop_core::amount_from_cents),
                "The payment for your checkout session failed",
                data.locale(),
            )
            .await;

        Ok(WebhookOutcome::Processed)
    }

    #[instrument(skip(self, data), fields(charge_id = %data.charge_id))]
    async fn on_charge_failed(&self, data: ChargeData) -> ShopResult<WebhookOutcome> {
        let reason = data.failure_reason();
        warn!(reason = %reason, "Charge failed");

        // Charges carry no locale of their own.
        let user = self.lookup_user(data.user_id()).await;
        let candidates = contact_candidates(data.customer_contact(), user.as_ref());
        self.notifier
            .payment_failed(
                candidates,
                &data.charge_id,
                data.amount_decimal(),
                &reason,
                Locale::default(),
            )
            .await;

        Ok(WebhookOutcome::Processed)
    }

    async fn on_ignored_event(&self, event: &WebhookEvent) -> ShopResult<WebhookOutcome> {
        debug!(
            event_id = %event.event_id,
            event_type = ?event.event_type,
            "Event type not processed, acknowledging"
        );
        Ok(WebhookOutcome::Ignored)
    }
}
