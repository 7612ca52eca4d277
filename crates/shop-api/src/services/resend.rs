//! # Resend Email Provider
//!
//! [`EmailSender`] backed by the Resend HTTP API (`POST /emails`).

use crate::services::templates::{self, RenderedEmail};
use async_trait::async_trait;
use serde::Serialize;
use shop_core::{
    CustomerContact, EmailSender, OrderConfirmationEmail, PaymentFailedEmail, ShopError,
    ShopResult,
};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<String>,
    subject: &'a str,
    text: &'a str,
}

/// Resend API client
pub struct ResendEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(client: reqwest::Client, api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    #[instrument(skip(self, to, rendered), fields(to = %to.email))]
    async fn send(&self, to: &CustomerContact, rendered: RenderedEmail) -> ShopResult<()> {
        let body = SendEmailRequest {
            from: &self.from,
            to: vec![format!("{} <{}>", to.name, to.email)],
            subject: &rendered.subject,
            text: &rendered.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShopError::Network(format!("Resend request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ShopError::EmailDelivery(format!(
                "Resend returned {}: {}",
                status, detail
            )));
        }

        debug!(%status, "Email accepted by Resend");
        Ok(())
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send_order_confirmation(&self, email: &OrderConfirmationEmail) -> ShopResult<()> {
        self.send(&email.to, templates::order_confirmation(email)).await
    }

    async fn send_payment_failed(&self, email: &PaymentFailedEmail) -> ShopResult<()> {
        self.send(&email.to, templates::payment_failed(email)).await
    }

    fn provider_name(&self) -> &'static str {
        "resend"
    }
}
