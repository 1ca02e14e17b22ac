//! IP address dimension
//!
//! `value` is the raw client address exactly as received, including
//! strings that failed to parse (typed `Invalid`).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "ip_addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ip_address_type_id: i64,
    #[sea_orm(column_type = "Text")]
    pub value: String,
    pub value_hash: String, // CHAR(16) xxHash64 hex
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
