//! Browser dimension, unique on (name, version)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "browsers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub version: String,
    pub major_version: Option<i64>,
    pub minor_version: Option<i64>,
    pub build_maintenance_version: Option<i64>,
    pub revision_build_version: Option<i64>,
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
