use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory_detail_attributes")]
#[schema(as = InventoryDetailAttribute)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub inventory_detail_id: Uuid,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_detail::Entity",
        from = "Column::InventoryDetailId",
        to = "super::inventory_detail::Column::Id"
    )]
    InventoryDetail,
}

impl Related<super::inventory_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryDetail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
