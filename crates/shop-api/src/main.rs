//! # Storefront Orders
//!
//! Stripe webhook receiver that records paid orders and emails customers.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export DATABASE_URL=postgres://localhost/storefront
//! export RESEND_API_KEY=re_...
//! export EMAIL_FROM="Storefront <orders@example.com>"
//! export CLERK_SECRET_KEY=sk_...
//!
//! # Run the server
//! storefront-orders
//! ```

use shop_api::{routes, state::wants_json_logs, AppConfig, AppState};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    let log_format = std::env::var("LOG_FORMAT").ok();
    init_tracing(wants_json_logs(log_format.as_deref(), &environment));

    // Print banner
    print_banner();

    // Initialize application state
    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    info!("Environment: {}", config.environment);
    let state = AppState::from_config(config).await?;

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("Storefront orders starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

fn print_banner() {
    println!(
        r#"
  Storefront Orders
  ━━━━━━━━━━━━━━━━━━━━━━━
  Stripe webhooks to orders
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
