//! Shared soft-delete capability. Deleted rows keep their data and get a
//! `deleted_at` stamp; live queries filter on `deleted_at IS NULL`.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Select};
use uuid::Uuid;

use crate::entities::{
    coupon, inventory, inventory_detail, inventory_detail_attribute, product, user,
};

pub trait SoftDelete: EntityTrait {
    fn id_column() -> Self::Column;
    fn deleted_at_column() -> Self::Column;

    /// `SELECT` restricted to rows that have not been soft-deleted
    fn find_live() -> Select<Self> {
        Self::find().filter(Self::deleted_at_column().is_null())
    }

    fn find_live_by_id(id: Uuid) -> Select<Self> {
        Self::find_live().filter(Self::id_column().eq(id))
    }
}

/// Stamps `deleted_at` on one live row. Returns false when nothing matched.
pub async fn soft_delete_by_id<E, C>(conn: &C, id: Uuid) -> Result<bool, DbErr>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    soft_delete_where::<E, C>(conn, Condition::all().add(E::id_column().eq(id)))
        .await
        .map(|rows| rows > 0)
}

/// Stamps `deleted_at` on every live row matching `condition`.
pub async fn soft_delete_where<E, C>(conn: &C, condition: Condition) -> Result<u64, DbErr>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    let result = E::update_many()
        .col_expr(E::deleted_at_column(), Expr::value(Utc::now()))
        .filter(condition)
        .filter(E::deleted_at_column().is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

macro_rules! soft_deletable {
    ($($module:ident),+ $(,)?) => {
        $(
            impl SoftDelete for $module::Entity {
                fn id_column() -> Self::Column {
                    $module::Column::Id
                }

                fn deleted_at_column() -> Self::Column {
                    $module::Column::DeletedAt
                }
            }
        )+
    };
}

soft_deletable!(
    user,
    coupon,
    product,
    inventory,
    inventory_detail,
    inventory_detail_attribute,
);
