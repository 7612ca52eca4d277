//! # Order Types
//!
//! Orders, their line items and the cart metadata they are built from.

use crate::error::{ShopError, ShopResult};
use crate::product::Product;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "FAILED" => Ok(OrderStatus::Failed),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Human-readable identifier shown to customers
    pub display_id: String,

    /// Authentication provider user id
    pub user_id: String,

    /// Amount charged, in dollars
    pub amount: Decimal,

    pub status: OrderStatus,

    pub stripe_checkout_session_id: String,

    /// Payment intent the checkout session was charged through
    pub stripe_charge_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    /// Unit price charged at purchase time
    pub price: Decimal,
}

impl OrderItem {
    pub fn total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An order line together with the product it refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: OrderItem,
    pub product: Product,
}

/// An order read back with its lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderDetails {
    /// Total number of units across all lines
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|l| l.item.quantity).sum()
    }
}

/// One entry of the `cartItems` checkout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product id
    pub id: String,

    /// Unit price in dollars
    pub price: Decimal,

    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

impl CartItem {
    /// Parse the JSON-encoded cart list stored in checkout metadata.
    ///
    /// Text that is not JSON is a format error; JSON that is not a non-empty
    /// array of well-formed items is a content error.
    pub fn parse_list(raw: &str) -> ShopResult<Vec<CartItem>> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ShopError::InvalidMetadataFormat(format!("cartItems: {}", e)))?;

        let entries = match value {
            serde_json::Value::Array(entries) if !entries.is_empty() => entries,
            serde_json::Value::Array(_) => {
                return Err(ShopError::InvalidMetadataContent(
                    "cartItems is empty".to_string(),
                ))
            }
            _ => {
                return Err(ShopError::InvalidMetadataContent(
                    "cartItems is not an array".to_string(),
                ))
            }
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let item: CartItem = serde_json::from_value(entry).map_err(|e| {
                    ShopError::InvalidMetadataContent(format!("cartItems[{}]: {}", index, e))
                })?;
                item.validate(index)?;
                Ok(item)
            })
            .collect()
    }

    fn validate(&self, index: usize) -> ShopResult<()> {
        if self.id.trim().is_empty() {
            return Err(ShopError::InvalidMetadataContent(format!(
                "cartItems[{}]: empty product id",
                index
            )));
        }
        if self.price.is_sign_negative() {
            return Err(ShopError::InvalidMetadataContent(format!(
                "cartItems[{}]: negative price",
                index
            )));
        }
        if self.quantity < 1 {
            return Err(ShopError::InvalidMetadataContent(format!(
                "cartItems[{}]: quantity must be at least 1",
                index
            )));
        }
        Ok(())
    }
}

/// Convert a Stripe amount in cents to dollars
pub fn amount_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

const DISPLAY_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DISPLAY_ID_SUFFIX_LEN: usize = 4;

/// Build a display id of the form `NJAE<yyyy>-OID<MMdd>-<HHmmss><XXXX>`.
///
/// The suffix is random, so two orders in the same second can collide; the
/// database keeps `display_id` unique and the insert fails in that case.
pub fn generate_display_id(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let suffix: String = (0..DISPLAY_ID_SUFFIX_LEN)
        .map(|_| DISPLAY_ID_ALPHABET[rng.gen_range(0..DISPLAY_ID_ALPHABET.len())] as char)
        .collect();

    format!(
        "NJAE{}-OID{}-{}{}",
        now.format("%Y"),
        now.format("%m%d"),
        now.format("%H%M%S"),
        suffix
    )
}

/// A validated `checkout.session.completed` payload
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOrderRequest {
    pub checkout_session_id: String,
    pub user_id: String,
    pub items: Vec<CartItem>,
    pub amount_total_cents: i64,
    pub payment_intent_id: String,
    pub customer_id: Option<String>,
}

/// Line of an order about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Order about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub id: Uuid,
    pub display_id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub stripe_checkout_session_id: String,
    pub stripe_charge_id: String,
    pub stripe_customer_id: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Completed order for a paid checkout session
    pub fn completed(request: &CheckoutOrderRequest, display_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_id: display_id.into(),
            user_id: request.user_id.clone(),
            amount: amount_from_cents(request.amount_total_cents),
            status: OrderStatus::Completed,
            stripe_checkout_session_id: request.checkout_session_id.clone(),
            stripe_charge_id: request.payment_intent_id.clone(),
            stripe_customer_id: request.customer_id.clone(),
            items: request
                .items
                .iter()
                .map(|item| NewOrderItem {
                    product_id: item.id.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        }
    }
}
