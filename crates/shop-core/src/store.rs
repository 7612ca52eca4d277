//! # Order Store Trait
//!
//! Persistence seam for the order pipeline. The production implementation
//! lives in `shop-db` (PostgreSQL); `InMemoryOrderStore` keeps the same
//! contract in process.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              OrderStore (trait)              │
//! │  ├── find_by_checkout_session()              │
//! │  ├── create_order()   (one transaction)      │
//! │  └── health_check()                          │
//! └──────────────────────────────────────────────┘
//!                       ▲
//!          ┌────────────┴────────────┐
//!  ┌───────┴───────┐         ┌───────┴────────┐
//!  │ PgOrderStore  │         │InMemoryOrder   │
//!  │  (shop-db)    │         │    Store       │
//!  └───────────────┘         └────────────────┘
//! ```

use crate::error::{ShopError, ShopResult};
use crate::order::{NewOrder, Order, OrderDetails, OrderItem, OrderLine};
use crate::product::Product;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of an order write
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    /// Order and items were written and read back
    Created(OrderDetails),
    /// An order for the same checkout session already exists; nothing written
    AlreadyExists,
}

/// Storage for orders created from checkout sessions
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up the order created for a checkout session, if any.
    async fn find_by_checkout_session(&self, checkout_session_id: &str)
        -> ShopResult<Option<Order>>;

    /// Insert the order and all its items atomically, then read them back
    /// with product data.
    async fn create_order(&self, order: NewOrder) -> ShopResult<Materialized>;

    /// Check the backing store is reachable.
    async fn health_check(&self) -> ShopResult<()> {
        Ok(())
    }

    /// Backend name (for logging).
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a shared store (dynamic dispatch)
pub type BoxedOrderStore = Arc<dyn OrderStore>;

#[derive(Default)]
struct MemoryTables {
    products: HashMap<String, Product>,
    orders: Vec<OrderDetails>,
}

/// Process-local order store.
///
/// Enforces the same constraints as the database schema: one order per
/// checkout session, unique display ids, and items must reference known
/// products.
#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<MemoryTables>,
    rows_written: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a product catalog
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let tables = MemoryTables {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            orders: Vec::new(),
        };
        Self {
            tables: Mutex::new(tables),
            rows_written: AtomicUsize::new(0),
        }
    }

    /// Add or replace a catalog product
    pub async fn add_product(&self, product: Product) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Snapshot of all stored orders
    pub async fn orders(&self) -> Vec<OrderDetails> {
        self.tables.lock().await.orders.clone()
    }

    /// Number of order and item rows written so far
    pub fn rows_written(&self) -> usize {
        self.rows_written.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> ShopResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|d| d.order.stripe_checkout_session_id == checkout_session_id)
            .map(|d| d.order.clone()))
    }

    async fn create_order(&self, new_order: NewOrder) -> ShopResult<Materialized> {
        let mut tables = self.tables.lock().await;

        if tables
            .orders
            .iter()
            .any(|d| d.order.stripe_checkout_session_id == new_order.stripe_checkout_session_id)
        {
            return Ok(Materialized::AlreadyExists);
        }

        if tables
            .orders
            .iter()
            .any(|d| d.order.display_id == new_order.display_id)
        {
            return Err(ShopError::Database(format!(
                "duplicate display id {}",
                new_order.display_id
            )));
        }

        // Resolve every product before writing anything.
        let mut products = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let product = tables.products.get(&item.product_id).ok_or_else(|| {
                ShopError::Database(format!("product {} does not exist", item.product_id))
            })?;
            products.push(product.clone());
        }

        let now = Utc::now();
        let order = Order {
            id: new_order.id,
            display_id: new_order.display_id,
            user_id: new_order.user_id,
            amount: new_order.amount,
            status: new_order.status,
            stripe_checkout_session_id: new_order.stripe_checkout_session_id,
            stripe_charge_id: new_order.stripe_charge_id,
            stripe_customer_id: new_order.stripe_customer_id,
            created_at: now,
            updated_at: now,
        };

        let lines: Vec<OrderLine> = new_order
            .items
            .into_iter()
            .zip(products)
            .map(|(item, product)| OrderLine {
                item: OrderItem {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                },
                product,
            })
            .collect();

        self.rows_written
            .fetch_add(1 + lines.len(), Ordering::SeqCst);

        let details = OrderDetails { order, lines };
        tables.orders.push(details.clone());

        Ok(Materialized::Created(details))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
