//! Checkout snapshots saved before payment and consumed by order creation.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order_session;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderSessionRequest {
    #[schema(value_type = Object)]
    pub snapshot: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSessionCreated {
    pub order_session_id: Uuid,
}

pub async fn create<C: ConnectionTrait>(
    conn: &C,
    snapshot: Value,
) -> Result<order_session::Model, ServiceError> {
    if !snapshot.is_object() {
        return Err(ServiceError::ValidationError(
            "Session snapshot must be a JSON object".to_string(),
        ));
    }
    let session = order_session::ActiveModel {
        id: Set(Uuid::new_v4()),
        snapshot: Set(snapshot),
        consumed_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;
    debug!(session_id = %session.id, "order session stored");
    Ok(session)
}

pub async fn load<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<order_session::Model, ServiceError> {
    order_session::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::BadRequest("Order session not found".to_string()))
}

/// Loads the session and stamps it as consumed. A session backs one order.
pub async fn consume<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<order_session::Model, ServiceError> {
    let session = load(conn, id).await?;
    let claimed = order_session::Entity::update_many()
        .col_expr(order_session::Column::ConsumedAt, Expr::value(Utc::now()))
        .filter(order_session::Column::Id.eq(id))
        .filter(order_session::Column::ConsumedAt.is_null())
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(ServiceError::BadRequest(
            "Order session already used".to_string(),
        ));
    }
    Ok(session)
}
