//! Per-user privacy preferences

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "privacy")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// 不记录页面访问
    #[sea_orm(default_value = false)]
    pub opt_out_tracking: bool,
    /// 不记录页面事件
    #[sea_orm(default_value = false)]
    pub opt_out_event_tracking: bool,
    /// 不允许他人查看该用户的数据
    #[sea_orm(default_value = false)]
    pub is_private: bool,
    pub is_internal: bool,
    pub created_at: DateTimeUtc,
    pub last_modified_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
