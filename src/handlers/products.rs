use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created_response, paginated, parse_id, success_response, AppJson, PaginationParams};
use crate::entities::product;
use crate::errors::ServiceError;
use crate::services::products::{CreateProductRequest, ProductDetail, UpdateProductRequest};
use crate::{ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Only products sold by this vendor
    pub vendor_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/product",
    summary = "List products",
    description = "Active catalog entries, newest first",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<PaginatedResponse<product::Model>>),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ServiceError> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (items, total) = state
        .services
        .products
        .list(page, limit, query.vendor_id)
        .await?;
    Ok(success_response(paginated(items, total, page, limit)))
}

#[utoipa::path(
    get,
    path = "/api/product/{id}",
    summary = "Get product",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with stock and variants", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Invalid product ID format", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>, ServiceError> {
    let id = parse_id(&id, "product")?;
    Ok(Json(ApiResponse::success(
        state.services.products.get(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/product",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.products.create(request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/product/{id}",
    summary = "Update product",
    params(("id" = String, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    let id = parse_id(&id, "product")?;
    let updated = state.services.products.update(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/product/{id}",
    summary = "Delete product",
    description = "Soft-deletes the product with its stock rows and variants",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let id = parse_id(&id, "product")?;
    state.services.products.soft_delete(id).await?;
    Ok(Json(ApiResponse::message("Product deleted")))
}
