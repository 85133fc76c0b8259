//! Stock counters. Reservations are single conditional statements so two
//! checkouts racing for the last unit cannot both win.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{inventory, inventory_detail};
use crate::errors::ServiceError;

/// One stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

fn insufficient(product_id: Uuid) -> ServiceError {
    ServiceError::InsufficientStock(format!("Insufficient stock for product {}", product_id))
}

/// Moves `quantity` from stock to sold. Untracked products pass through.
pub async fn reserve<C: ConnectionTrait>(conn: &C, line: StockLine) -> Result<(), ServiceError> {
    let q = line.quantity;
    match line.variant_id {
        Some(variant_id) => {
            let result = inventory_detail::Entity::update_many()
                .col_expr(
                    inventory_detail::Column::Stock,
                    Expr::col(inventory_detail::Column::Stock).sub(q),
                )
                .col_expr(
                    inventory_detail::Column::Sold,
                    Expr::col(inventory_detail::Column::Sold).add(q),
                )
                .col_expr(inventory_detail::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_detail::Column::Id.eq(variant_id))
                .filter(inventory_detail::Column::ProductId.eq(line.product_id))
                .filter(inventory_detail::Column::DeletedAt.is_null())
                .filter(inventory_detail::Column::Stock.gte(q))
                .exec(conn)
                .await?;
            if result.rows_affected == 0 {
                return Err(insufficient(line.product_id));
            }
        }
        None => {
            let tracked = inventory::Entity::find()
                .filter(inventory::Column::ProductId.eq(line.product_id))
                .filter(inventory::Column::DeletedAt.is_null())
                .one(conn)
                .await?
                .is_some();
            if !tracked {
                debug!(product_id = %line.product_id, "untracked product, skipping reservation");
                return Ok(());
            }

            let result = inventory::Entity::update_many()
                .col_expr(
                    inventory::Column::Stock,
                    Expr::col(inventory::Column::Stock).sub(q),
                )
                .col_expr(inventory::Column::Sold, Expr::col(inventory::Column::Sold).add(q))
                .col_expr(inventory::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory::Column::ProductId.eq(line.product_id))
                .filter(inventory::Column::DeletedAt.is_null())
                .filter(inventory::Column::Stock.gte(q))
                .exec(conn)
                .await?;
            if result.rows_affected == 0 {
                return Err(insufficient(line.product_id));
            }
        }
    }
    Ok(())
}

/// Returns `quantity` from sold to stock. Missing rows are ignored.
pub async fn restore<C: ConnectionTrait>(conn: &C, line: StockLine) -> Result<(), ServiceError> {
    let q = line.quantity;
    let rows = match line.variant_id {
        Some(variant_id) => {
            inventory_detail::Entity::update_many()
                .col_expr(
                    inventory_detail::Column::Stock,
                    Expr::col(inventory_detail::Column::Stock).add(q),
                )
                .col_expr(
                    inventory_detail::Column::Sold,
                    Expr::col(inventory_detail::Column::Sold).sub(q),
                )
                .col_expr(inventory_detail::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_detail::Column::Id.eq(variant_id))
                .exec(conn)
                .await?
                .rows_affected
        }
        None => {
            inventory::Entity::update_many()
                .col_expr(
                    inventory::Column::Stock,
                    Expr::col(inventory::Column::Stock).add(q),
                )
                .col_expr(inventory::Column::Sold, Expr::col(inventory::Column::Sold).sub(q))
                .col_expr(inventory::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory::Column::ProductId.eq(line.product_id))
                .exec(conn)
                .await?
                .rows_affected
        }
    };
    if rows == 0 {
        debug!(product_id = %line.product_id, "no inventory row to restore");
    }
    Ok(())
}
