use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{
    created_response, paginated, parse_id, success_response, AppJson, PaginationParams,
};
use crate::auth::{consts as perm, AuthUser};
use crate::errors::{ApiError, ServiceError};
use crate::services::calculator::validate_money;
use crate::services::coupons::AppliedCoupon;
use crate::services::order_sessions::{CreateOrderSessionRequest, OrderSessionCreated};
use crate::services::orders::{
    CancelResult, CreateOrderRequest, OrderCreated, OrderDetail, OrderFilters, OrderSort,
    OrderSummary,
};
use crate::{ApiResponse, AppState, PaginatedResponse};

/// Query string of `GET /api/order`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Buyer whose history is listed (public mode)
    pub user_id: Option<String>,
    /// `true` switches to the operator listing
    #[serde(default)]
    pub admin: bool,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// JSON object, e.g. `{"status":"pending"}`
    pub filters: Option<String>,
    /// JSON object, e.g. `{"created_at":"desc"}`
    pub sort: Option<String>,
}

/// Body shared by the coupon preview and validate endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheckRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code is required"))]
    pub code: String,
    #[validate(custom = "validate_money")]
    #[schema(value_type = String, example = "250.00")]
    pub order_total: Decimal,
    #[validate(email(message = "userEmail must be a valid email address"))]
    pub user_email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/order",
    summary = "Place order",
    description = "Validates and re-prices the cart, splits it per vendor, reserves stock, applies the coupon and records payment in one transaction",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderCreated>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request, price mismatch or coupon rejected", body = crate::errors::ErrorResponse),
        (status = 402, description = "Insufficient wallet balance", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.orders.create_order(request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/order",
    summary = "List orders",
    description = "Buyer history with `user_id`, or the operator listing with `admin=true` (requires orders:read)",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderSummary>>),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ApiError> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);

    let (filters, sort) = if query.admin {
        let user = state.services.auth.authenticate(&headers).await?;
        user.require(perm::ORDERS_READ)?;

        let filters = match query.filters.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => serde_json::from_str::<OrderFilters>(raw).map_err(|e| {
                ServiceError::BadRequest(format!("Invalid filters parameter: {}", e))
            })?,
            None => OrderFilters::default(),
        };
        let sort = match query.sort.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => OrderSort::parse(raw)?,
            None => OrderSort::default(),
        };
        (filters, sort)
    } else {
        let raw = query
            .user_id
            .as_deref()
            .ok_or_else(|| ServiceError::BadRequest("user_id is required".to_string()))?;
        let filters = OrderFilters {
            user_id: Some(parse_id(raw, "user")?),
            ..OrderFilters::default()
        };
        (filters, OrderSort::default())
    };

    let (items, total) = state
        .services
        .orders
        .list_orders(&filters, sort, page, limit)
        .await?;
    Ok(success_response(paginated(items, total, page, limit)))
}

#[utoipa::path(
    get,
    path = "/api/order/{id}",
    summary = "Get order",
    description = "Order with address, sub-orders and their items, audit trail and payment summary",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid order ID format", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let order_id = parse_id(&id, "order")?;
    let detail = state.services.orders.get_order(order_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/order/{id}",
    summary = "Cancel order",
    description = "Cancels the order and its sub-orders, appends an audit entry and restores stock",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order canceled", body = ApiResponse<CancelResult>),
        (status = 400, description = "Invalid ID, already canceled or returned", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CancelResult>>, ServiceError> {
    let order_id = parse_id(&id, "order")?;
    let result = state
        .services
        .orders
        .cancel_order(order_id, &auth_user.subject)
        .await?;
    info!(%order_id, actor = %auth_user.subject, "order canceled via API");
    Ok(Json(ApiResponse::success(result).with_message("Order canceled")))
}

#[utoipa::path(
    post,
    path = "/api/order/apply-coupon",
    summary = "Preview coupon",
    description = "Computes the discount a coupon gives for an order total without redeeming it",
    request_body = CouponCheckRequest,
    responses(
        (status = 200, description = "Coupon applies", body = ApiResponse<AppliedCoupon>),
        (status = 400, description = "Coupon rejected; message carries the reason", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    AppJson(request): AppJson<CouponCheckRequest>,
) -> Result<Json<ApiResponse<AppliedCoupon>>, ServiceError> {
    request.validate()?;
    let applied = state
        .services
        .coupons
        .preview(
            &request.code,
            request.order_total,
            request.user_email.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(applied)))
}

#[utoipa::path(
    post,
    path = "/api/order/session",
    summary = "Save checkout session",
    description = "Stores a checkout snapshot that a later order can reference",
    request_body = CreateOrderSessionRequest,
    responses(
        (status = 201, description = "Session stored", body = ApiResponse<OrderSessionCreated>),
        (status = 400, description = "Snapshot is not a JSON object", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_session(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateOrderSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state
        .services
        .orders
        .create_session(request.snapshot)
        .await?;
    Ok(created_response(created))
}
