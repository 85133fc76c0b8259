#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use gemstore_api::{
    auth::{consts as perm, ADMIN_ROLE},
    cache::{CacheBackend, InMemoryCache},
    config::AppConfig,
    db,
    entities::{coupon, DiscountType},
    events::{self, EventSender},
    services::{
        coupons::CreateCouponRequest,
        products::{CreateProductRequest, InventoryInput, ProductDetail, VariantInput},
        users::{self, CustomerDetails},
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str =
    "k3J9vQ2mX7pL4wR8tY1uZ6nB5cV0aS3dF9gH2jK7lM4qW8eR1tY6uI0oP5zX2cV9";

/// Application wired against a throwaway SQLite file and an in-process cache.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    admin_token: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("gemstore_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "redis://127.0.0.1:6379".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // SQLite serialises writers; one connection keeps concurrent checkouts queued
        // instead of failing with SQLITE_BUSY.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.db_acquire_timeout_secs = 30;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(cfg, Arc::new(pool), cache, EventSender::new(event_tx));
        let admin_token = state
            .services
            .auth
            .issue_token("test-admin", vec![ADMIN_ROLE.to_string()], vec![])
            .await
            .expect("issue admin token")
            .access_token;

        let router = gemstore_api::build_router(state.clone());

        Self {
            router,
            state,
            admin_token,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Token for a non-admin operator holding exactly `permissions`.
    pub async fn token_with(&self, permissions: &[&str]) -> String {
        self.state
            .services
            .auth
            .issue_token(
                "test-operator",
                vec![],
                permissions.iter().map(|p| p.to_string()).collect(),
            )
            .await
            .expect("issue operator token")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn seed_product(
        &self,
        price: Decimal,
        tax_rate: Decimal,
        vendor_id: Option<Uuid>,
        stock: Option<i32>,
    ) -> ProductDetail {
        self.state
            .services
            .products
            .create(CreateProductRequest {
                name: format!("Ring {}", Uuid::new_v4().simple()),
                description: Some("Seeded for integration tests".to_string()),
                sku: None,
                price,
                sale_price: None,
                tax_rate,
                vendor_id,
                is_active: true,
                inventory: stock.map(|stock| InventoryInput { stock }),
                variants: vec![],
            })
            .await
            .expect("seed product")
    }

    /// Product with one variant carrying its own price and stock.
    pub async fn seed_variant_product(
        &self,
        price: Decimal,
        variant_price: Decimal,
        variant_stock: i32,
    ) -> ProductDetail {
        self.state
            .services
            .products
            .create(CreateProductRequest {
                name: format!("Pendant {}", Uuid::new_v4().simple()),
                description: None,
                sku: None,
                price,
                sale_price: None,
                tax_rate: Decimal::ZERO,
                vendor_id: None,
                is_active: true,
                inventory: None,
                variants: vec![VariantInput {
                    sku: Some(format!("PD-{}", Uuid::new_v4().simple())),
                    price: Some(variant_price),
                    stock: variant_stock,
                    attributes: vec![],
                }],
            })
            .await
            .expect("seed variant product")
    }

    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: DiscountType,
        value: Decimal,
        usage_limit: Option<i32>,
    ) -> coupon::Model {
        self.state
            .services
            .coupons
            .create(CreateCouponRequest {
                code: code.to_string(),
                description: None,
                discount_type,
                value,
                min_order_amount: None,
                max_discount: None,
                usage_limit,
                valid_from: None,
                valid_to: None,
                is_active: true,
                vendor_id: None,
            })
            .await
            .expect("seed coupon")
    }

    /// Creates the buyer if needed and credits their wallet.
    pub async fn fund_wallet(&self, email: &str, amount: Decimal) -> Uuid {
        let db = self.state.db.as_ref();
        let buyer = users::resolve_buyer(
            db,
            &CustomerDetails {
                name: "Wallet Buyer".to_string(),
                email: email.to_string(),
                phone: None,
            },
        )
        .await
        .expect("resolve buyer");
        users::credit_wallet(db, buyer.id, amount)
            .await
            .expect("credit wallet");
        buyer.id
    }

    /// Places an order through the API and returns its id.
    pub async fn place_order(&self, body: Value) -> Uuid {
        let (status, payload) = self.send(Method::POST, "/api/order", Some(body), None).await;
        assert_eq!(status, StatusCode::CREATED, "order failed: {payload}");
        payload["data"]["order_id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("order id in response")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Cart line for a simple (non-variant) product
pub fn line(product_id: Uuid, quantity: i32, price: &str) -> Value {
    json!({
        "product_id": product_id,
        "quantity": quantity,
        "price": price,
        "options": { "kind": "simple" }
    })
}

/// Minimal valid order body for `email` with `cart`.
pub fn order_body(email: &str, cart: Vec<Value>) -> Value {
    json!({
        "customer": { "name": "Ada Buyer", "email": email, "phone": "+15550100" },
        "shipping_address": {
            "name": "Ada Buyer",
            "address_line1": "1 Facet Lane",
            "city": "Antwerp",
            "country": "BE"
        },
        "cart": cart
    })
}

/// Reads a decimal string field and rounds to cents.
pub fn money(value: &Value) -> Decimal {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.parse::<Decimal>()
        .unwrap_or_else(|_| panic!("not a decimal: {raw}"))
        .round_dp(2)
}

pub const ORDER_READ: &str = perm::ORDERS_READ;
pub const ORDER_CANCEL: &str = perm::ORDERS_CANCEL;
