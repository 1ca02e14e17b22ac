//! Device dimension, unique on (device_type_id, manufacturer_id, name)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub device_type_id: i64,
    pub manufacturer_id: i64,
    pub name: String,
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
