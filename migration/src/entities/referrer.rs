//! Referrer dimension

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "referrers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub referrer_type_id: i64,
    #[sea_orm(column_type = "Text")]
    pub value: String,
    pub value_hash: String,
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
