//! # Storefront Error Types
//!
//! Typed error handling for the order pipeline.
//! Every fallible operation returns `Result<T, ShopError>`; the HTTP layer
//! maps the variant to a status code, which in turn drives Stripe's
//! redelivery policy (4xx is final, 5xx is retried).

use thiserror::Error;

/// Core error type for webhook processing, persistence and notification
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing webhook secret, bad env values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stripe-Signature header missing, malformed or not matching
    #[error("Webhook signature verification failed: {0}")]
    SignatureVerification(String),

    /// Verified body that is not a well-formed event
    #[error("Webhook payload error: {0}")]
    PayloadParse(String),

    /// Checkout session lacks a field needed to build an order
    #[error("Missing required session data: {0}")]
    MissingSessionData(String),

    /// Cart metadata is not valid JSON
    #[error("Invalid metadata format: {0}")]
    InvalidMetadataFormat(String),

    /// Cart metadata is JSON but not a non-empty list of cart items
    #[error("Invalid metadata content: {0}")]
    InvalidMetadataContent(String),

    /// The order transaction failed
    #[error("Database error during order creation: {0}")]
    OrderCreation(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Authentication provider lookup failed
    #[error("User lookup failed: {0}")]
    UserLookup(String),

    /// Email provider rejected the message
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    /// Network/HTTP error talking to a collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// Returns true if a redelivery of the same event could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShopError::OrderCreation(_)
                | ShopError::Database(_)
                | ShopError::UserLookup(_)
                | ShopError::EmailDelivery(_)
                | ShopError::Network(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 400,
            ShopError::SignatureVerification(_) => 400,
            ShopError::PayloadParse(_) => 400,
            ShopError::MissingSessionData(_) => 400,
            ShopError::InvalidMetadataFormat(_) => 400,
            ShopError::InvalidMetadataContent(_) => 400,
            ShopError::OrderCreation(_) => 500,
            ShopError::Database(_) => 500,
            ShopError::UserLookup(_) => 502,
            ShopError::EmailDelivery(_) => 502,
            ShopError::Network(_) => 503,
            ShopError::Internal(_) => 500,
        }
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;
