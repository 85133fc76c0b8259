use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub sub_order_id: Uuid,
    pub product_id: Uuid,
    /// Inventory detail row the line was reserved against
    pub variant_id: Option<Uuid>,
    pub diamond_id: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub tax_amount: Decimal,
    /// Serialized `LineOptions` as submitted, after validation
    pub options: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::sub_order::Entity",
        from = "Column::SubOrderId",
        to = "super::sub_order::Column::Id",
        on_delete = "Cascade"
    )]
    SubOrder,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::sub_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
