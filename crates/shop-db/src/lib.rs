//! # shop-db
//!
//! PostgreSQL persistence for the storefront order pipeline.
//!
//! `PgOrderStore` implements `shop_core::OrderStore` on a sqlx pool:
//! - one transaction per order (order row, bulk item insert, read-back)
//! - a unique constraint on `stripe_checkout_session_id` with
//!   `ON CONFLICT DO NOTHING`, so concurrent deliveries of the same
//!   checkout session produce a single order
//!
//! Migrations live in `migrations/` and are embedded with `sqlx::migrate!`.

pub mod pg;

pub use pg::PgOrderStore;
