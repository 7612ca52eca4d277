//! # Application State
//!
//! Shared state for the Axum application.
//! Holds configuration, the webhook verifier, the order store and the
//! fulfillment service wired to the email provider and user directory.

use crate::services::{ClerkUserDirectory, OrderFulfillment, ResendEmailSender};
use rust_decimal::Decimal;
use shop_core::{
    BoxedEmailSender, BoxedOrderStore, BoxedUserDirectory, InMemoryOrderStore, LoggingEmailSender,
    NoUserDirectory, Product, ProductCategory, ShopError, ShopResult,
};
use shop_db::PgOrderStore;
use shop_stripe::{StripeConfig, StripeWebhookVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
pub const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com";

/// Timeout for calls to the email provider and user directory
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// PostgreSQL connection string
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Resend API key; emails are only logged without it
    pub resend_api_key: Option<String>,
    pub resend_api_url: String,
    /// Sender address for transactional email
    pub email_from: Option<String>,
    /// Clerk secret key; user fallback contacts are unavailable without it
    pub clerk_secret_key: Option<String>,
    pub clerk_api_url: String,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Stripe webhook settings
    pub stripe: StripeConfig,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> ShopResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ShopResult<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let json_logs = wants_json_logs(var("LOG_FORMAT").as_deref(), &environment);

        let config = Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var("PORT", var("PORT"), 8080)?,
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                5,
            )?,
            resend_api_key: var("RESEND_API_KEY"),
            resend_api_url: var("RESEND_API_URL")
                .unwrap_or_else(|| DEFAULT_RESEND_API_URL.to_string()),
            email_from: var("EMAIL_FROM"),
            clerk_secret_key: var("CLERK_SECRET_KEY"),
            clerk_api_url: var("CLERK_API_URL")
                .unwrap_or_else(|| DEFAULT_CLERK_API_URL.to_string()),
            json_logs,
            stripe: StripeConfig::from_lookup(&lookup)?,
            environment,
        };

        if config.resend_api_key.is_some() && config.email_from.is_none() {
            return Err(ShopError::Configuration(
                "EMAIL_FROM is required when RESEND_API_KEY is set".to_string(),
            ));
        }

        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> ShopResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                ShopError::Configuration(format!(
                    "Invalid socket address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// JSON logs when `LOG_FORMAT=json`, or in production unless another format
/// is requested
pub fn wants_json_logs(log_format: Option<&str>, environment: &str) -> bool {
    match log_format {
        Some(format) => format.eq_ignore_ascii_case("json"),
        None => environment == "production",
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> ShopResult<T> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ShopError::Configuration(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Stripe signature verifier
    pub verifier: StripeWebhookVerifier,
    /// Order persistence
    pub store: BoxedOrderStore,
    /// Webhook handler that materializes orders and sends notifications
    pub fulfillment: Arc<OrderFulfillment>,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: AppConfig,
        store: BoxedOrderStore,
        email: BoxedEmailSender,
        users: BoxedUserDirectory,
    ) -> Self {
        let verifier = StripeWebhookVerifier::new(config.stripe.clone());
        let fulfillment = Arc::new(OrderFulfillment::new(store.clone(), email, users));
        Self {
            config,
            verifier,
            store,
            fulfillment,
        }
    }

    /// Build the store and provider clients described by the configuration
    pub async fn from_config(config: AppConfig) -> ShopResult<Self> {
        let store = build_store(&config).await?;

        let http = reqwest::Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .map_err(|e| ShopError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let email: BoxedEmailSender = match (&config.resend_api_key, &config.email_from) {
            (Some(key), Some(from)) => Arc::new(ResendEmailSender::new(
                http.clone(),
                &config.resend_api_url,
                key,
                from,
            )),
            _ => {
                warn!("RESEND_API_KEY not set, emails will only be logged");
                Arc::new(LoggingEmailSender)
            }
        };

        let users: BoxedUserDirectory = match &config.clerk_secret_key {
            Some(key) => Arc::new(ClerkUserDirectory::new(http, &config.clerk_api_url, key)),
            None => {
                warn!("CLERK_SECRET_KEY not set, user fallback contacts are unavailable");
                Arc::new(NoUserDirectory)
            }
        };

        info!(
            store = store.backend_name(),
            email = email.provider_name(),
            "Services initialized"
        );

        Ok(Self::new(config, store, email, users))
    }
}

async fn build_store(config: &AppConfig) -> ShopResult<BoxedOrderStore> {
    match &config.database_url {
        Some(url) => {
            let store = PgOrderStore::connect(url, config.database_max_connections).await?;
            store.run_migrations().await?;
            Ok(Arc::new(store))
        }
        None if config.is_production() => Err(ShopError::Configuration(
            "DATABASE_URL is required in production".to_string(),
        )),
        None => {
            let catalog = development_catalog();
            let ids: Vec<&str> = catalog.iter().map(|p| p.id.as_str()).collect();
            warn!(
                products = ?ids,
                "DATABASE_URL not set, using in-memory order store; carts with other product ids will fail"
            );
            Ok(Arc::new(InMemoryOrderStore::with_products(catalog)))
        }
    }
}

/// Products seeded into the in-memory store for local runs
pub fn development_catalog() -> Vec<Product> {
    vec![
        Product::new(
            "dev-brush-pack",
            "Dry Brush Pack",
            Decimal::new(1200, 2),
            ProductCategory::Brushes,
        )
        .with_description(
            "Twenty dry brushes for textured lettering",
            Some("Vingt pinceaux secs pour le lettrage texturé".to_string()),
        ),
        Product::new(
            "dev-sticker-sheet",
            "Botanical Sticker Sheet",
            Decimal::new(500, 2),
            ProductCategory::Stickers,
        ),
        Product::new(
            "dev-weekly-planner",
            "Weekly Planner",
            Decimal::new(900, 2),
            ProductCategory::Planners,
        ),
    ]
}
