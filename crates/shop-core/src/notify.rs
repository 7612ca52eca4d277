//! # Notification Traits
//!
//! Seams for the email provider and the authentication provider's user
//! directory, plus no-op implementations used when a provider is not
//! configured.

use crate::contact::{CustomerContact, UserProfile};
use crate::error::ShopResult;
use crate::locale::Locale;
use crate::order::OrderDetails;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Order confirmation for a completed checkout
#[derive(Debug, Clone)]
pub struct OrderConfirmationEmail {
    pub to: CustomerContact,
    pub order: OrderDetails,
    pub locale: Locale,
}

/// Notice that a payment did not go through
#[derive(Debug, Clone)]
pub struct PaymentFailedEmail {
    pub to: CustomerContact,
    /// Charge or checkout session id
    pub reference: String,
    /// Attempted amount in dollars, when known
    pub amount: Option<Decimal>,
    pub reason: String,
    pub locale: Locale,
}

/// Transactional email provider
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_order_confirmation(&self, email: &OrderConfirmationEmail) -> ShopResult<()>;

    async fn send_payment_failed(&self, email: &PaymentFailedEmail) -> ShopResult<()>;

    /// Provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Authentication provider user lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch a user; `Ok(None)` when the id is unknown.
    async fn get_user(&self, user_id: &str) -> ShopResult<Option<UserProfile>>;
}

pub type BoxedEmailSender = Arc<dyn EmailSender>;
pub type BoxedUserDirectory = Arc<dyn UserDirectory>;

/// Email sender that only logs (no provider configured)
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send_order_confirmation(&self, email: &OrderConfirmationEmail) -> ShopResult<()> {
        info!(
            to = %email.to.email,
            display_id = %email.order.order.display_id,
            locale = %email.locale,
            "Email provider disabled, skipping order confirmation"
        );
        Ok(())
    }

    async fn send_payment_failed(&self, email: &PaymentFailedEmail) -> ShopResult<()> {
        info!(
            to = %email.to.email,
            reference = %email.reference,
            locale = %email.locale,
            "Email provider disabled, skipping payment failure notice"
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "logging"
    }
}

/// User directory that knows nobody (no provider configured)
pub struct NoUserDirectory;

#[async_trait]
impl UserDirectory for NoUserDirectory {
    async fn get_user(&self, user_id: &str) -> ShopResult<Option<UserProfile>> {
        warn!(user_id, "User directory disabled, cannot resolve user");
        Ok(None)
    }
}
