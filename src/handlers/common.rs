use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::{ApiResponse, PaginatedResponse};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// JSON body extractor whose rejections use the error envelope with a 400
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ServiceError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ServiceError::BadRequest("Expected a JSON request body".to_string())
        }
        other => ServiceError::BadRequest(format!("Invalid request body: {}", other.body_text())),
    }
}

/// Parses a path id, reporting `Invalid <what> ID format` on failure.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::BadRequest(format!("Invalid {} ID format", what)))
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page
    pub limit: Option<u64>,
}

impl PaginationParams {
    /// Applies configured defaults and caps the page size.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size);
        (page, limit)
    }
}

pub fn paginated<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    let total_pages = if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "redis://127.0.0.1".into(),
            "x".repeat(64),
            3600,
            "127.0.0.1".into(),
            0,
            "test".into(),
        )
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let config = config();
        let (page, limit) = PaginationParams::default().resolve(&config);
        assert_eq!(page, 1);
        assert_eq!(limit, config.api_default_page_size);

        let (page, limit) = PaginationParams {
            page: Some(0),
            limit: Some(10_000),
        }
        .resolve(&config);
        assert_eq!(page, 1);
        assert_eq!(limit, config.api_max_page_size);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(paginated(vec![1, 2], 5, 1, 2).total_pages, 3);
        assert_eq!(paginated::<u8>(vec![], 0, 1, 20).total_pages, 0);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id("not-a-uuid", "order").unwrap_err();
        assert_eq!(err.response_message(), "Invalid order ID format");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
