//! PostgreSQL implementation of [`OrderStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shop_core::{
    Materialized, NewOrder, Order, OrderDetails, OrderItem, OrderLine, OrderStatus, OrderStore,
    Product, ProductCategory, ShopError, ShopResult,
};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, display_id, user_id, amount, status, stripe_checkout_session_id, \
     stripe_charge_id, stripe_customer_id, created_at, updated_at";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> ShopError {
    move |e| ShopError::Database(format!("{}: {}", context, e))
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    display_id: String,
    user_id: String,
    amount: Decimal,
    status: String,
    stripe_checkout_session_id: String,
    stripe_charge_id: String,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = ShopError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(ShopError::Database)?;
        Ok(Order {
            id: row.id,
            display_id: row.display_id,
            user_id: row.user_id,
            amount: row.amount,
            status,
            stripe_checkout_session_id: row.stripe_checkout_session_id,
            stripe_charge_id: row.stripe_charge_id,
            stripe_customer_id: row.stripe_customer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    item_id: Uuid,
    order_id: Uuid,
    product_id: String,
    quantity: i32,
    item_price: Decimal,
    name: String,
    product_price: Decimal,
    description: String,
    description_fr: Option<String>,
    category: String,
    zip_file_path: String,
    image_paths: Vec<String>,
    tags: Vec<String>,
    product_created_at: DateTime<Utc>,
    product_updated_at: DateTime<Utc>,
}

impl TryFrom<LineRow> for OrderLine {
    type Error = ShopError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let category: ProductCategory = row.category.parse().map_err(ShopError::Database)?;
        Ok(OrderLine {
            item: OrderItem {
                id: row.item_id,
                order_id: row.order_id,
                product_id: row.product_id.clone(),
                quantity: row.quantity,
                price: row.item_price,
            },
            product: Product {
                id: row.product_id,
                name: row.name,
                price: row.product_price,
                description: row.description,
                description_fr: row.description_fr,
                category,
                zip_file_path: row.zip_file_path,
                image_paths: row.image_paths,
                tags: row.tags,
                created_at: row.product_created_at,
                updated_at: row.product_updated_at,
            },
        })
    }
}

/// Order store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Connect a new pool.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> ShopResult<Self> {
        info!(max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations bundled with this crate.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> ShopResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ShopError::Database(format!("migrations: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Insert or update a catalog product (seeding and tests)
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn upsert_product(&self, product: &Product) -> ShopResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, description, description_fr, category,
                                  zip_file_path, image_paths, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                description = EXCLUDED.description,
                description_fr = EXCLUDED.description_fr,
                category = EXCLUDED.category,
                zip_file_path = EXCLUDED.zip_file_path,
                image_paths = EXCLUDED.image_paths,
                tags = EXCLUDED.tags,
                updated_at = NOW()
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.description_fr)
        .bind(product.category.as_str())
        .bind(&product.zip_file_path)
        .bind(&product.image_paths)
        .bind(&product.tags)
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert product"))?;
        Ok(())
    }

    async fn load_details(conn: &mut PgConnection, order_id: Uuid) -> ShopResult<OrderDetails> {
        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("read order"))?;

        let line_rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT oi.id AS item_id, oi.order_id, oi.product_id, oi.quantity,
                   oi.price AS item_price,
                   p.name, p.price AS product_price, p.description, p.description_fr,
                   p.category, p.zip_file_path, p.image_paths, p.tags,
                   p.created_at AS product_created_at, p.updated_at AS product_updated_at
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY p.name, oi.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("read order items"))?;

        Ok(OrderDetails {
            order: Order::try_from(order_row)?,
            lines: line_rows
                .into_iter()
                .map(OrderLine::try_from)
                .collect::<ShopResult<Vec<_>>>()?,
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self))]
    async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> ShopResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE stripe_checkout_session_id = $1",
            ORDER_COLUMNS
        ))
        .bind(checkout_session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find order by checkout session"))?;

        row.map(Order::try_from).transpose()
    }

    #[instrument(
        skip(self, order),
        fields(
            order_id = %order.id,
            display_id = %order.display_id,
            session_id = %order.stripe_checkout_session_id,
            items = order.items.len()
        )
    )]
    async fn create_order(&self, order: NewOrder) -> ShopResult<Materialized> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        // The unique constraint on the checkout session closes the race between
        // concurrent deliveries that both passed the existence check.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, display_id, user_id, amount, status,
                                stripe_checkout_session_id, stripe_charge_id, stripe_customer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (stripe_checkout_session_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(order.id)
        .bind(&order.display_id)
        .bind(&order.user_id)
        .bind(order.amount)
        .bind(order.status.as_str())
        .bind(&order.stripe_checkout_session_id)
        .bind(&order.stripe_charge_id)
        .bind(&order.stripe_customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("insert order"))?;

        if inserted.is_none() {
            warn!("Order for checkout session already exists, rolling back");
            tx.rollback().await.map_err(db_error("rollback"))?;
            return Ok(Materialized::AlreadyExists);
        }

        if !order.items.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price) ",
            );
            builder.push_values(order.items.iter(), |mut row, item| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(order.id)
                    .push_bind(item.product_id.clone())
                    .push_bind(item.quantity)
                    .push_bind(item.price);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert order items"))?;
        }

        let details = Self::load_details(&mut *tx, order.id).await?;

        tx.commit().await.map_err(db_error("commit"))?;

        info!(lines = details.lines.len(), "Order committed");
        Ok(Materialized::Created(details))
    }

    async fn health_check(&self) -> ShopResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("health check"))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
