//! Webhook processing services and provider clients.

pub mod clerk;
pub mod fulfillment;
pub mod notifier;
pub mod resend;
pub mod templates;

pub use clerk::ClerkUserDirectory;
pub use fulfillment::OrderFulfillment;
pub use notifier::{DeliveryReport, Notifier};
pub use resend::ResendEmailSender;
