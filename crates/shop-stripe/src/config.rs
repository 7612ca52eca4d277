//! # Stripe Configuration
//!
//! Webhook settings for the Stripe integration.
//! Secrets are loaded from environment variables.

use shop_core::ShopError;
use std::env;
use tracing::warn;

/// Default allowed clock skew between Stripe and us, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Stripe webhook configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Webhook signing secret (whsec_...). Requests are rejected while unset.
    pub webhook_secret: Option<String>,

    /// Maximum age of a signed timestamp
    pub tolerance_secs: i64,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// - `STRIPE_WEBHOOK_SECRET` (optional; webhook calls fail with 400 without it)
    /// - `STRIPE_WEBHOOK_TOLERANCE_SECS` (default 300)
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ShopError> {
        let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty());

        match webhook_secret.as_deref() {
            None => warn!("STRIPE_WEBHOOK_SECRET not set, webhook requests will be rejected"),
            Some(secret) if !secret.starts_with("whsec_") => {
                warn!("STRIPE_WEBHOOK_SECRET does not start with whsec_")
            }
            Some(_) => {}
        }

        let tolerance_secs = match lookup("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ShopError::Configuration(format!(
                    "STRIPE_WEBHOOK_TOLERANCE_SECS must be an integer, got {}",
                    raw
                ))
            })?,
            None => DEFAULT_TOLERANCE_SECS,
        };

        Ok(Self {
            webhook_secret,
            tolerance_secs,
        })
    }

    /// Create config with an explicit secret (for testing)
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: Some(webhook_secret.into()),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Config without a secret
    pub fn unconfigured() -> Self {
        Self {
            webhook_secret: None,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Builder: set timestamp tolerance
    pub fn with_tolerance(mut self, secs: i64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    /// The signing secret, or a configuration error
    pub fn require_secret(&self) -> Result<&str, ShopError> {
        self.webhook_secret.as_deref().ok_or_else(|| {
            ShopError::Configuration("Stripe webhook secret is not configured".to_string())
        })
    }
}
