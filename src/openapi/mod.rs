use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gemstore API",
        version = "1.0.0",
        description = r#"
# Gemstore order API

Checkout, coupon and catalog backend for a multi-vendor jewelry storefront.

## Authentication

Operator endpoints take an HS256 JWT in the Authorization header:

```
Authorization: Bearer <token>
```

Tokens are minted with `gemstore-cli issue-token` and revoked through
`POST /api/auth/logout`.

## Money

Amounts are decimal strings with two fractional digits, e.g. `"231.00"`.

## Error Handling

Failures share one envelope:

```json
{
  "success": false,
  "message": "Order not found",
  "request_id": "0b7d...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Checkout, order reads and cancellation"),
        (name = "coupons", description = "Coupon validation and management"),
        (name = "products", description = "Catalog reads and management"),
        (name = "auth", description = "Session management"),
        (name = "health", description = "Liveness")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::apply_coupon,
        crate::handlers::orders::create_session,

        // Coupons
        crate::handlers::coupons::validate_coupon,
        crate::handlers::coupons::list_coupons,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::update_coupon,
        crate::handlers::coupons::delete_coupon,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        crate::auth::logout_handler,
        crate::health_check,
    ),
    components(
        schemas(
            crate::services::orders::LineOptions,
            crate::services::orders::OrderFilters,
            crate::services::calculator::ShippingBreakdown,
            crate::entities::OrderStatus,
            crate::entities::PaymentStatus,
            crate::entities::PaymentGateway,
            crate::entities::OrderType,
            crate::entities::DiscountType,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
