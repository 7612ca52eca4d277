use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shop_api::{create_router, AppConfig, AppState};
use shop_core::{
    BoxedOrderStore, ContactSource, CustomerContact, EmailAddress, EmailSender, InMemoryOrderStore,
    Locale, Materialized, NewOrder, Order, OrderConfirmationEmail, OrderStore, PaymentFailedEmail,
    Product, ProductCategory, ShopError, ShopResult, UserDirectory, UserProfile,
};
use shop_stripe::signature_header;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SECRET: &str = "whsec_flow_test_secret";
const CART: &str = r#"[{"id":"p1","price":10},{"id":"p2","price":5}]"#;

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Confirmation {
        to: CustomerContact,
        display_id: String,
        locale: Locale,
    },
    PaymentFailed {
        to: CustomerContact,
        reference: String,
        reason: String,
        locale: Locale,
    },
}

/// Records accepted emails; addresses in `rejected` fail delivery
#[derive(Default)]
struct RecordingEmailSender {
    rejected: Vec<String>,
    sent: Mutex<Vec<Sent>>,
    attempts: Mutex<usize>,
}

impl RecordingEmailSender {
    fn rejecting(addresses: &[&str]) -> Self {
        Self {
            rejected: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    fn accept(&self, to: &CustomerContact, record: Sent) -> ShopResult<()> {
        *self.attempts.lock().unwrap() += 1;
        if self.rejected.contains(&to.email) {
            return Err(ShopError::EmailDelivery("mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(record);
        Ok(())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_order_confirmation(&self, email: &OrderConfirmationEmail) -> ShopResult<()> {
        self.accept(
            &email.to,
            Sent::Confirmation {
                to: email.to.clone(),
                display_id: email.order.order.display_id.clone(),
                locale: email.locale,
            },
        )
    }

    async fn send_payment_failed(&self, email: &PaymentFailedEmail) -> ShopResult<()> {
        self.accept(
            &email.to,
            Sent::PaymentFailed {
                to: email.to.clone(),
                reference: email.reference.clone(),
                reason: email.reason.clone(),
                locale: email.locale,
            },
        )
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

struct StaticUserDirectory {
    users: HashMap<String, UserProfile>,
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn get_user(&self, user_id: &str) -> ShopResult<Option<UserProfile>> {
        Ok(self.users.get(user_id).cloned())
    }
}

/// Store whose writes and health checks always fail
struct FailingStore;

#[async_trait]
impl OrderStore for FailingStore {
    async fn find_by_checkout_session(&self, _: &str) -> ShopResult<Option<Order>> {
        Ok(None)
    }

    async fn create_order(&self, _: NewOrder) -> ShopResult<Materialized> {
        Err(ShopError::Database("connection reset by peer".to_string()))
    }

    async fn health_check(&self) -> ShopResult<()> {
        Err(ShopError::Database("connection refused".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Store that loses every insert to a concurrent delivery of the same session
struct RacingStore;

#[async_trait]
impl OrderStore for RacingStore {
    async fn find_by_checkout_session(&self, _: &str) -> ShopResult<Option<Order>> {
        Ok(None)
    }

    async fn create_order(&self, _: NewOrder) -> ShopResult<Materialized> {
        Ok(Materialized::AlreadyExists)
    }

    fn backend_name(&self) -> &'static str {
        "racing"
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    server: TestServer,
    store: Arc<InMemoryOrderStore>,
    email: Arc<RecordingEmailSender>,
}

fn config(secret: Option<&str>) -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "STRIPE_WEBHOOK_SECRET" => secret.map(String::from),
        _ => None,
    })
    .unwrap()
}

fn ada() -> UserProfile {
    UserProfile {
        id: "user_1".into(),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        primary_email_address_id: Some("idn_1".into()),
        email_addresses: vec![EmailAddress {
            id: "idn_1".into(),
            email_address: "ada@example.com".into(),
        }],
    }
}

fn catalog() -> Vec<Product> {
    vec![
        Product::new("p1", "Watercolor Brushes", Decimal::new(1000, 2), ProductCategory::Brushes),
        Product::new("p2", "Sticker Sheet", Decimal::new(500, 2), ProductCategory::Stickers),
    ]
}

fn build(
    secret: Option<&str>,
    store: BoxedOrderStore,
    email: Arc<RecordingEmailSender>,
) -> TestServer {
    let users = Arc::new(StaticUserDirectory {
        users: HashMap::from([("user_1".to_string(), ada())]),
    });
    let state = AppState::new(config(secret), store, email, users);
    TestServer::new(create_router(state)).unwrap()
}

fn harness_with(email: RecordingEmailSender) -> Harness {
    let store = Arc::new(InMemoryOrderStore::with_products(catalog()));
    let email = Arc::new(email);
    let server = build(Some(SECRET), store.clone(), email.clone());
    Harness {
        server,
        store,
        email,
    }
}

fn harness() -> Harness {
    harness_with(RecordingEmailSender::default())
}

// =============================================================================
// Payloads
// =============================================================================

fn session(metadata: Value) -> Value {
    json!({
        "id": "cs_test_1",
        "object": "checkout.session",
        "amount_total": 1500,
        "currency": "usd",
        "payment_intent": "pi_test_1",
        "customer": "cus_test_1",
        "customer_details": { "name": "Jo Martin", "email": "jo@example.com" },
        "payment_status": "paid",
        "metadata": metadata
    })
}

fn event(event_type: &str, object: Value) -> String {
    json!({
        "id": "evt_test_1",
        "object": "event",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    })
    .to_string()
}

fn completed(metadata: Value) -> String {
    event("checkout.session.completed", session(metadata))
}

fn sign(payload: &str) -> String {
    signature_header(SECRET, Utc::now().timestamp(), payload.as_bytes())
}

async fn post(server: &TestServer, payload: &str, signature: Option<String>) -> TestResponse {
    let mut request = server.post("/webhook/stripe").text(payload.to_string());
    if let Some(signature) = signature {
        request = request.add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        );
    }
    request.await
}

async fn deliver(server: &TestServer, payload: &str) -> TestResponse {
    post(server, payload, Some(sign(payload))).await
}

fn error_text(response: &TestResponse) -> String {
    response.json::<Value>()["error"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Checkout completed
// =============================================================================

#[tokio::test]
async fn completed_checkout_creates_order_and_confirms() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART, "locale": "fr" }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "received": true }));

    let orders = h.store.orders().await;
    assert_eq!(orders.len(), 1);
    let details = &orders[0];
    assert_eq!(details.order.amount, Decimal::new(1500, 2));
    assert_eq!(details.order.user_id, "user_1");
    assert_eq!(details.order.stripe_charge_id, "pi_test_1");
    assert_eq!(details.order.stripe_customer_id.as_deref(), Some("cus_test_1"));
    assert!(details.order.display_id.starts_with("NJAE"));
    assert_eq!(details.lines.len(), 2);
    assert_eq!(details.lines[0].item.product_id, "p1");
    assert_eq!(details.lines[0].item.price, Decimal::from(10));
    assert_eq!(details.lines[1].item.product_id, "p2");
    assert_eq!(details.lines[1].item.price, Decimal::from(5));
    assert_eq!(h.store.rows_written(), 3);

    assert_eq!(
        h.email.sent(),
        vec![Sent::Confirmation {
            to: CustomerContact {
                name: "Jo Martin".into(),
                email: "jo@example.com".into(),
                source: ContactSource::PaymentProvider,
            },
            display_id: details.order.display_id.clone(),
            locale: Locale::Fr,
        }]
    );
}

#[tokio::test]
async fn replayed_checkout_is_acknowledged_without_side_effects() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);
    let rows_after_first = h.store.rows_written();

    let replay = deliver(&h.server, &payload).await;
    assert_eq!(replay.status_code(), StatusCode::OK);

    assert_eq!(h.store.orders().await.len(), 1);
    assert_eq!(h.store.rows_written(), rows_after_first);
    assert_eq!(h.email.sent().len(), 1);
}

#[tokio::test]
async fn missing_cart_items_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1" }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Missing required session data"));
    assert!(error_text(&response).contains("cartItems"));
    assert_eq!(h.store.rows_written(), 0);
    assert_eq!(h.email.attempts(), 0);
}

#[tokio::test]
async fn malformed_cart_items_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": "{invalid-json" }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Invalid metadata format"));
    assert_eq!(h.store.rows_written(), 0);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": "[]" }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Invalid metadata content"));
    assert_eq!(h.store.rows_written(), 0);
}

#[tokio::test]
async fn unsupported_locale_falls_back_to_default() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART, "locale": "xx" }));

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);

    match h.email.sent().as_slice() {
        [Sent::Confirmation { locale, .. }] => assert_eq!(*locale, Locale::default()),
        other => panic!("unexpected emails: {:?}", other),
    }
}

#[tokio::test]
async fn user_account_is_used_without_customer_details() {
    let h = harness();
    let mut object = session(json!({ "userId": "user_1", "cartItems": CART }));
    object["customer_details"] = Value::Null;
    let payload = event("checkout.session.completed", object);

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);

    match h.email.sent().as_slice() {
        [Sent::Confirmation { to, .. }] => {
            assert_eq!(to.name, "Ada Lovelace");
            assert_eq!(to.email, "ada@example.com");
            assert_eq!(to.source, ContactSource::UserAccount);
        }
        other => panic!("unexpected emails: {:?}", other),
    }
}

#[tokio::test]
async fn rejected_provider_contact_falls_back_to_user() {
    let h = harness_with(RecordingEmailSender::rejecting(&["jo@example.com"]));
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);

    assert_eq!(h.email.attempts(), 2);
    match h.email.sent().as_slice() {
        [Sent::Confirmation { to, .. }] => assert_eq!(to.email, "ada@example.com"),
        other => panic!("unexpected emails: {:?}", other),
    }
}

#[tokio::test]
async fn notification_failure_still_acknowledges() {
    let h = harness_with(RecordingEmailSender::rejecting(&[
        "jo@example.com",
        "ada@example.com",
    ]));
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(h.store.orders().await.len(), 1);
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn concurrent_delivery_is_acknowledged_without_notification() {
    let email = Arc::new(RecordingEmailSender::default());
    let server = build(Some(SECRET), Arc::new(RacingStore), email.clone());
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    let response = deliver(&server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "received": true }));
    assert_eq!(email.attempts(), 0);
}

#[tokio::test]
async fn store_failure_returns_server_error() {
    let email = Arc::new(RecordingEmailSender::default());
    let server = build(Some(SECRET), Arc::new(FailingStore), email.clone());
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    let response = deliver(&server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_text(&response).contains("Database error during order creation"));
    assert_eq!(email.attempts(), 0);
}

#[tokio::test]
async fn unknown_product_rolls_back_and_returns_server_error() {
    let h = harness();
    let cart = r#"[{"id":"p1","price":10},{"id":"p404","price":5}]"#;
    let payload = completed(json!({ "userId": "user_1", "cartItems": cart }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.store.rows_written(), 0);
}

// =============================================================================
// Payment failures
// =============================================================================

#[tokio::test]
async fn failed_charge_notifies_in_default_locale() {
    let h = harness();
    let payload = event(
        "charge.failed",
        json!({
            "id": "ch_test_1",
            "object": "charge",
            "amount": 2000,
            "payment_intent": "pi_test_2",
            "billing_details": { "name": "Jo Martin", "email": "jo@example.com" },
            "failure_code": "card_declined",
            "failure_message": "Your card was declined.",
            "metadata": { "userId": "user_1", "locale": "fr" }
        }),
    );

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);
    assert_eq!(h.store.rows_written(), 0);

    match h.email.sent().as_slice() {
        [Sent::PaymentFailed {
            to,
            reference,
            reason,
            locale,
        }] => {
            assert_eq!(to.email, "jo@example.com");
            assert_eq!(reference, "ch_test_1");
            assert_eq!(reason, "Your card was declined.");
            assert_eq!(*locale, Locale::default());
        }
        other => panic!("unexpected emails: {:?}", other),
    }
}

#[tokio::test]
async fn failed_async_checkout_notifies_in_session_locale() {
    let h = harness();
    let mut object = session(json!({ "userId": "user_1", "cartItems": CART, "locale": "fr" }));
    object["payment_status"] = json!("unpaid");
    let payload = event("checkout.session.async_payment_failed", object);

    assert_eq!(deliver(&h.server, &payload).await.status_code(), StatusCode::OK);
    assert_eq!(h.store.rows_written(), 0);

    match h.email.sent().as_slice() {
        [Sent::PaymentFailed {
            reference, locale, ..
        }] => {
            assert_eq!(reference, "cs_test_1");
            assert_eq!(*locale, Locale::Fr);
        }
        other => panic!("unexpected emails: {:?}", other),
    }
}

// =============================================================================
// Filtering and verification
// =============================================================================

#[tokio::test]
async fn unlisted_event_type_is_acknowledged_and_ignored() {
    let h = harness();
    let payload = event("customer.created", json!({ "id": "cus_test_1", "object": "customer" }));

    let response = deliver(&h.server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "received": true }));
    assert_eq!(h.store.rows_written(), 0);
    assert_eq!(h.email.attempts(), 0);
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));
    let forged = signature_header("whsec_someone_else", Utc::now().timestamp(), payload.as_bytes());

    let response = post(&h.server, &payload, Some(forged)).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("signature verification failed"));
    assert_eq!(h.store.rows_written(), 0);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));
    let stale = signature_header(SECRET, Utc::now().timestamp() - 3600, payload.as_bytes());

    let response = post(&h.server, &payload, Some(stale)).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.rows_written(), 0);
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let h = harness();
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    let response = post(&h.server, &payload, None).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Missing Stripe-Signature header"));
}

#[tokio::test]
async fn missing_secret_is_a_configuration_error() {
    let store = Arc::new(InMemoryOrderStore::with_products(catalog()));
    let server = build(None, store.clone(), Arc::new(RecordingEmailSender::default()));
    let payload = completed(json!({ "userId": "user_1", "cartItems": CART }));

    let response = deliver(&server, &payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Configuration error"));
    assert_eq!(store.rows_written(), 0);
}

#[tokio::test]
async fn unparseable_body_is_rejected() {
    let h = harness();
    let payload = "not json at all";

    let response = deliver(&h.server, payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_text(&response).contains("Webhook payload error"));
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_endpoints() {
    let h = harness();

    let health = h.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "healthy");

    let ready = h.server.get("/health/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["store"], "memory");

    let failing = build(
        Some(SECRET),
        Arc::new(FailingStore),
        Arc::new(RecordingEmailSender::default()),
    );
    let unready = failing.get("/health/ready").await;
    assert_eq!(unready.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}
