//! # shop-core
//!
//! Core types and traits for the storefront order pipeline.
//!
//! This crate provides:
//! - `Order`, `OrderItem`, `CartItem` and display-id generation
//! - `Product` and `ProductCategory` for the downloadable catalog
//! - `WebhookEvent` and the processed-event allow-list
//! - `OrderStore`, `EmailSender` and `UserDirectory` seams
//! - `CustomerContact` resolution and `Locale` selection
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CartItem, CheckoutOrderRequest, NewOrder, OrderStore, generate_display_id};
//!
//! let items = CartItem::parse_list(r#"[{"id":"p1","price":10}]"#)?;
//! let request = CheckoutOrderRequest { items, /* ... */ };
//!
//! let display_id = generate_display_id(chrono::Utc::now(), &mut rand::thread_rng());
//! let outcome = store.create_order(NewOrder::completed(&request, display_id)).await?;
//! ```

pub mod contact;
pub mod error;
pub mod event;
pub mod locale;
pub mod notify;
pub mod order;
pub mod product;
pub mod store;

// Re-exports for convenience
pub use contact::{contact_candidates, ContactSource, CustomerContact, EmailAddress, UserProfile};
pub use error::{ShopError, ShopResult};
pub use event::{WebhookEvent, WebhookEventType};
pub use locale::Locale;
pub use notify::{
    BoxedEmailSender, BoxedUserDirectory, EmailSender, LoggingEmailSender, NoUserDirectory,
    OrderConfirmationEmail, PaymentFailedEmail, UserDirectory,
};
pub use order::{
    amount_from_cents, generate_display_id, CartItem, CheckoutOrderRequest, NewOrder,
    NewOrderItem, Order, OrderDetails, OrderItem, OrderLine, OrderStatus,
};
pub use product::{Product, ProductCategory};
pub use store::{BoxedOrderStore, InMemoryOrderStore, Materialized, OrderStore};
