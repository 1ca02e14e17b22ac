//! 用户隐私记录

use sea_orm::sea_query::OnConflict;
use sea_orm::{DbErr, EntityTrait, Set};

use migration::entities::privacy;

use super::SeaOrmStorage;
use crate::errors::{AnalyticsError, Result};
use crate::storage::models::PrivacySettings;
use crate::storage::traits::PrivacyStore;

#[async_trait::async_trait]
impl PrivacyStore for SeaOrmStorage {
    /// 原子性插入默认隐私记录（如果不存在）
    ///
    /// - `Ok(true)`: 新建
    /// - `Ok(false)`: 记录已存在，保持原值
    async fn ensure_privacy_record(&self, user_id: i64) -> Result<bool> {
        let model = privacy::ActiveModel {
            user_id: Set(user_id),
            opt_out_tracking: Set(false),
            opt_out_event_tracking: Set(false),
            is_private: Set(false),
            is_internal: Set(false),
            created_at: Set(chrono::Utc::now()),
            last_modified_at: Set(None),
            deleted_at: Set(None),
        };

        let result = privacy::Entity::insert(model)
            .on_conflict(
                OnConflict::column(privacy::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(affected) => Ok(affected > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("no rows") || err_str.contains("record not inserted") {
                    Ok(false)
                } else {
                    Err(AnalyticsError::database_operation(format!(
                        "Failed to ensure privacy record for user {}: {}",
                        user_id, e
                    )))
                }
            }
        }
    }

    async fn privacy_settings(&self, user_id: i64) -> Result<Option<PrivacySettings>> {
        let row = privacy::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| {
                AnalyticsError::database_operation(format!(
                    "Failed to load privacy settings for user {}: {}",
                    user_id, e
                ))
            })?;

        Ok(row.map(|m| PrivacySettings {
            opt_out_tracking: m.opt_out_tracking,
            opt_out_event_tracking: m.opt_out_event_tracking,
            is_private: m.is_private,
        }))
    }
}
