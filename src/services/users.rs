//! Buyer lookups and wallet movements. Every function takes the caller's
//! connection so it can run inside the order transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::SoftDelete;
use crate::entities::user;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerDetails {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub name: String,
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<user::Model>, ServiceError> {
    Ok(user::Entity::find_live()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(conn)
        .await?)
}

/// Finds the buyer by email, creating a guest account on first checkout.
pub async fn resolve_buyer<C: ConnectionTrait>(
    conn: &C,
    customer: &CustomerDetails,
) -> Result<user::Model, ServiceError> {
    if let Some(existing) = find_by_email(conn, &customer.email).await? {
        debug!(user_id = %existing.id, "resolved existing buyer");
        return Ok(existing);
    }

    let guest = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(customer.name.trim().to_string()),
        email: Set(normalize_email(&customer.email)),
        phone: Set(customer.phone.clone()),
        is_guest: Set(true),
        wallet_balance: Set(Decimal::ZERO),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        deleted_at: Set(None),
    }
    .insert(conn)
    .await?;

    info!(user_id = %guest.id, "created guest buyer");
    Ok(guest)
}

/// Debits the wallet only if the balance covers `amount`.
pub async fn debit_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    amount: Decimal,
) -> Result<(), ServiceError> {
    if amount.is_sign_negative() {
        return Err(ServiceError::ValidationError(
            "Debit amount cannot be negative".to_string(),
        ));
    }

    let result = user::Entity::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).sub(amount),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::WalletBalance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::PaymentFailed(
            "Insufficient wallet balance".to_string(),
        ));
    }
    Ok(())
}

pub async fn credit_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    amount: Decimal,
) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Credit amount must be positive".to_string(),
        ));
    }

    let result = user::Entity::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).add(amount),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::DeletedAt.is_null())
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound("User not found".to_string()));
    }
    Ok(())
}
