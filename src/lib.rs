//! Gemstore API library
//!
//! Order pipeline, coupon engine and catalog backend for a multi-vendor
//! jewelry storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Extension, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::cache::CacheBackend;
use crate::db::DbPool;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub cache: Arc<dyn CacheBackend>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service from shared infrastructure.
    pub fn new(
        config: config::AppConfig,
        db: Arc<DbPool>,
        cache: Arc<dyn CacheBackend>,
        event_sender: events::EventSender,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let services =
            handlers::AppServices::new(db.clone(), event_sender.clone(), cache.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            cache,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api` route, unlayered
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/order", handlers::order_routes())
        .nest("/coupon", handlers::coupon_routes())
        .nest("/product", handlers::product_routes())
        .nest("/auth", auth::auth_routes())
}

/// The full application router with the shared middleware stack. CORS is
/// left to the binary since it depends on deployment settings.
pub fn build_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();
    let auth_service = state.services.auth.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api", api_routes())
        .layer(Extension(auth_service))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout.max(Duration::from_secs(1))))
        .layer(CompressionLayer::new())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

/// Database ping plus a cache write/read round trip
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Component health")),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let probe_key = "health:probe";
    let probe_value = Utc::now().timestamp_millis().to_string();
    let cache_status = match state
        .cache
        .set(probe_key, &probe_value, Some(Duration::from_secs(10)))
        .await
    {
        Ok(()) => match state.cache.get(probe_key).await {
            Ok(Some(read)) if read == probe_value => "healthy",
            _ => "unhealthy",
        },
        Err(e) => {
            ::tracing::warn!(error = %e, "cache health probe failed");
            "unhealthy"
        }
    };

    let healthy = db_status == "healthy" && cache_status == "healthy";
    Ok(Json(ApiResponse::success(json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
            "cache": cache_status,
        },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}
