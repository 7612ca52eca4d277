//! # Notification Dispatch
//!
//! Sends customer emails through an [`EmailSender`], walking an ordered list
//! of candidate contacts. The first successful send stops the walk; each
//! failure is logged and the next candidate is tried. Delivery problems never
//! fail the webhook; they surface only as a [`DeliveryReport`].

use rust_decimal::Decimal;
use shop_core::{
    BoxedEmailSender, ContactSource, CustomerContact, Locale, OrderConfirmationEmail,
    OrderDetails, PaymentFailedEmail, ShopResult,
};
use std::future::Future;
use tracing::{error, info, warn};

/// How a notification ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Accepted by the provider for this recipient
    Sent { source: ContactSource, email: String },
    /// Every candidate was tried and failed
    Failed { attempts: usize },
    /// No usable contact
    NoRecipient,
}

impl DeliveryReport {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryReport::Sent { .. })
    }
}

/// Customer notification service
#[derive(Clone)]
pub struct Notifier {
    sender: BoxedEmailSender,
}

impl Notifier {
    pub fn new(sender: BoxedEmailSender) -> Self {
        Self { sender }
    }

    /// Email an order confirmation
    pub async fn order_confirmed(
        &self,
        candidates: Vec<CustomerContact>,
        order: &OrderDetails,
        locale: Locale,
    ) -> DeliveryReport {
        let display_id = order.order.display_id.as_str();
        self.deliver("order_confirmation", display_id, candidates, |to| {
            let email = OrderConfirmationEmail {
                to,
                order: order.clone(),
                locale,
            };
            let sender = &self.sender;
            async move { sender.send_order_confirmation(&email).await }
        })
        .await
    }

    /// Email a payment failure notice
    pub async fn payment_failed(
        &self,
        candidates: Vec<CustomerContact>,
        reference: &str,
        amount: Option<Decimal>,
        reason: &str,
        locale: Locale,
    ) -> DeliveryReport {
        self.deliver("payment_failed", reference, candidates, |to| {
            let email = PaymentFailedEmail {
                to,
                reference: reference.to_string(),
                amount,
                reason: reason.to_string(),
                locale,
            };
            let sender = &self.sender;
            async move { sender.send_payment_failed(&email).await }
        })
        .await
    }

    async fn deliver<F, Fut>(
        &self,
        kind: &'static str,
        reference: &str,
        candidates: Vec<CustomerContact>,
        send: F,
    ) -> DeliveryReport
    where
        F: Fn(CustomerContact) -> Fut,
        Fut: Future<Output = ShopResult<()>>,
    {
        if candidates.is_empty() {
            warn!(kind, reference, "No contact available, notification not sent");
            return DeliveryReport::NoRecipient;
        }

        let attempts = candidates.len();
        for contact in candidates {
            let source = contact.source;
            let email = contact.email.clone();
            match send(contact).await {
                Ok(()) => {
                    info!(
                        kind,
                        reference,
                        to = %email,
                        ?source,
                        provider = self.sender.provider_name(),
                        "Notification sent"
                    );
                    return DeliveryReport::Sent { source, email };
                }
                Err(e) => {
                    warn!(kind, reference, to = %email, ?source, error = %e, "Notification attempt failed");
                }
            }
        }

        error!(kind, reference, attempts, "All notification attempts failed");
        DeliveryReport::Failed { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shop_core::{EmailSender, ShopError};
    use std::sync::{Arc, Mutex};

    /// Records recipients; rejects the configured addresses
    #[derive(Default)]
    struct Recorder {
        rejected: Vec<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn attempt(&self, to: &CustomerContact) -> ShopResult<()> {
            self.attempts.lock().unwrap().push(to.email.clone());
            if self.rejected.contains(&to.email) {
                Err(ShopError::EmailDelivery("mailbox unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EmailSender for Recorder {
        async fn send_order_confirmation(&self, email: &OrderConfirmationEmail) -> ShopResult<()> {
            self.attempt(&email.to)
        }

        async fn send_payment_failed(&self, email: &PaymentFailedEmail) -> ShopResult<()> {
            self.attempt(&email.to)
        }

        fn provider_name(&self) -> &'static str {
            "recorder"
        }
    }

    fn contact(email: &str, source: ContactSource) -> CustomerContact {
        CustomerContact {
            name: "Jo".into(),
            email: email.into(),
            source,
        }
    }

    async fn notify(recorder: Arc<Recorder>, candidates: Vec<CustomerContact>) -> DeliveryReport {
        Notifier::new(recorder)
            .payment_failed(candidates, "ch_1", None, "declined", Locale::En)
            .await
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let recorder = Arc::new(Recorder::default());
        let report = notify(
            recorder.clone(),
            vec![
                contact("stripe@example.com", ContactSource::PaymentProvider),
                contact("user@example.com", ContactSource::UserAccount),
            ],
        )
        .await;

        assert_eq!(
            report,
            DeliveryReport::Sent {
                source: ContactSource::PaymentProvider,
                email: "stripe@example.com".into()
            }
        );
        assert_eq!(*recorder.attempts.lock().unwrap(), vec!["stripe@example.com"]);
    }

    #[tokio::test]
    async fn test_falls_back_after_failure() {
        let recorder = Arc::new(Recorder {
            rejected: vec!["stripe@example.com".into()],
            ..Default::default()
        });
        let report = notify(
            recorder.clone(),
            vec![
                contact("stripe@example.com", ContactSource::PaymentProvider),
                contact("user@example.com", ContactSource::UserAccount),
            ],
        )
        .await;

        assert_eq!(
            report,
            DeliveryReport::Sent {
                source: ContactSource::UserAccount,
                email: "user@example.com".into()
            }
        );
        assert_eq!(recorder.attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let recorder = Arc::new(Recorder {
            rejected: vec!["stripe@example.com".into()],
            ..Default::default()
        });
        let report = notify(
            recorder,
            vec![contact("stripe@example.com", ContactSource::PaymentProvider)],
        )
        .await;
        assert_eq!(report, DeliveryReport::Failed { attempts: 1 });
        assert!(!report.is_sent());
    }

    #[tokio::test]
    async fn test_no_recipient() {
        let recorder = Arc::new(Recorder::default());
        let report = notify(recorder.clone(), Vec::new()).await;
        assert_eq!(report, DeliveryReport::NoRecipient);
        assert!(recorder.attempts.lock().unwrap().is_empty());
    }
}
