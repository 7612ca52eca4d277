//! # shop-api
//!
//! HTTP API layer for the storefront order service.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Stripe webhook endpoint that materializes orders
//! - Customer notifications through Resend, with Clerk user fallback
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Liveness |
//! | GET | `/health/ready` | Readiness (order store reachable) |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
