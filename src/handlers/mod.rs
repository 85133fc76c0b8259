pub mod common;
pub mod coupons;
pub mod orders;
pub mod products;

use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

use crate::auth::{consts as perm, AuthConfig, AuthRouterExt, AuthService};
use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::invoices::JsonInvoiceRenderer;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub coupons: Arc<crate::services::coupons::CouponService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: Arc<dyn CacheBackend>,
        config: &AppConfig,
    ) -> Self {
        let ttl = config.cache_ttl();

        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            cache.clone(),
            event_sender.clone(),
            config.checkout.clone(),
            Arc::new(JsonInvoiceRenderer),
            ttl,
        ));
        let coupons = Arc::new(crate::services::coupons::CouponService::new(
            db_pool.clone(),
            cache.clone(),
            event_sender.clone(),
            ttl,
        ));
        let products = Arc::new(crate::services::products::ProductService::new(
            db_pool,
            cache.clone(),
            event_sender,
            ttl,
        ));
        let auth = Arc::new(AuthService::new(AuthConfig::from(config), cache));

        Self {
            orders,
            coupons,
            products,
            auth,
        }
    }
}

/// `/api/order` routes. Cancellation is operator only; the listing checks
/// permissions itself because its admin mode is chosen by query string.
pub fn order_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", post(orders::create_order).get(orders::list_orders))
        .route("/apply-coupon", post(orders::apply_coupon))
        .route("/session", post(orders::create_session))
        .route("/:id", get(orders::get_order));

    let cancel = Router::new()
        .route("/:id", put(orders::cancel_order))
        .with_permission(perm::ORDERS_CANCEL);

    public.merge(cancel)
}

pub fn coupon_routes() -> Router<AppState> {
    let public = Router::new().route("/validate", post(coupons::validate_coupon));

    let manage = Router::new()
        .route("/", get(coupons::list_coupons).post(coupons::create_coupon))
        .route(
            "/:id",
            get(coupons::get_coupon)
                .put(coupons::update_coupon)
                .delete(coupons::delete_coupon),
        )
        .with_permission(perm::COUPONS_MANAGE);

    public.merge(manage)
}

pub fn product_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(products::list_products))
        .route("/:id", get(products::get_product));

    let manage = Router::new()
        .route("/", post(products::create_product))
        .route(
            "/:id",
            put(products::update_product).delete(products::delete_product),
        )
        .with_permission(perm::PRODUCTS_MANAGE);

    public.merge(manage)
}
