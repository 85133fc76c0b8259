use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use validator::Validate;

use super::common::{created_response, paginated, parse_id, success_response, AppJson, PaginationParams};
use super::orders::CouponCheckRequest;
use crate::entities::coupon;
use crate::errors::ServiceError;
use crate::services::coupons::{CouponValidation, CreateCouponRequest, UpdateCouponRequest};
use crate::{ApiResponse, AppState, PaginatedResponse};

#[utoipa::path(
    post,
    path = "/api/coupon/validate",
    summary = "Validate coupon",
    description = "Checks a coupon against an order total. Rejections are reported in the body with a 200.",
    request_body = CouponCheckRequest,
    responses(
        (status = 200, description = "Validation verdict", body = ApiResponse<CouponValidation>),
        (status = 400, description = "Malformed request", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    AppJson(request): AppJson<CouponCheckRequest>,
) -> Result<Json<ApiResponse<CouponValidation>>, ServiceError> {
    request.validate()?;
    let verdict = state
        .services
        .coupons
        .validate_for(
            &request.code,
            request.order_total,
            request.user_email.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(verdict)))
}

#[utoipa::path(
    get,
    path = "/api/coupon",
    summary = "List coupons",
    params(PaginationParams),
    responses(
        (status = 200, description = "Coupons retrieved", body = ApiResponse<PaginatedResponse<coupon::Model>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (items, total) = state.services.coupons.list(page, limit).await?;
    Ok(success_response(paginated(items, total, page, limit)))
}

#[utoipa::path(
    post,
    path = "/api/coupon",
    summary = "Create coupon",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<coupon::Model>),
        (status = 400, description = "Invalid coupon or duplicate code", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateCouponRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.coupons.create(request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/coupon/{id}",
    summary = "Get coupon",
    params(("id" = String, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon retrieved", body = ApiResponse<coupon::Model>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<coupon::Model>>, ServiceError> {
    let id = parse_id(&id, "coupon")?;
    Ok(Json(ApiResponse::success(state.services.coupons.get(id).await?)))
}

#[utoipa::path(
    put,
    path = "/api/coupon/{id}",
    summary = "Update coupon",
    params(("id" = String, Path, description = "Coupon ID")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated", body = ApiResponse<coupon::Model>),
        (status = 400, description = "Invalid update", body = crate::errors::ErrorResponse),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateCouponRequest>,
) -> Result<Json<ApiResponse<coupon::Model>>, ServiceError> {
    let id = parse_id(&id, "coupon")?;
    let updated = state.services.coupons.update(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/coupon/{id}",
    summary = "Delete coupon",
    description = "Soft-deletes the coupon; it stops validating immediately",
    params(("id" = String, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let id = parse_id(&id, "coupon")?;
    state.services.coupons.soft_delete(id).await?;
    Ok(Json(ApiResponse::message("Coupon deleted")))
}
