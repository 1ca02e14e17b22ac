//! Request fact entity: one append-only row per tracked HTTP request

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_type_id: i64,
    /// Opaque identity of the authenticated user, if any
    pub user_id: Option<i64>,
    pub referrer_id: Option<i64>,
    pub method_id: i64,
    pub ip_address_id: i64,
    pub device_id: Option<i64>,
    pub browser_id: Option<i64>,
    pub operating_system_id: Option<i64>,
    pub url_id: i64,
    pub user_agent_id: i64,
    pub is_ajax: bool,
    pub requested_at: DateTimeUtc,
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
