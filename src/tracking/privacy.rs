//! 隐私偏好
//!
//! 用户开通时由宿主应用显式调用 `ensure_privacy_record`；
//! 没有记录的用户视为未退出采集。

use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::storage::{PrivacySettings, PrivacyStore};

#[derive(Clone)]
pub struct PrivacyService {
    store: Arc<dyn PrivacyStore>,
}

impl PrivacyService {
    pub fn new(store: Arc<dyn PrivacyStore>) -> Self {
        Self { store }
    }

    /// 为新用户写入默认隐私记录，已存在时不做修改
    pub async fn ensure_privacy_record(&self, user_id: i64) -> Result<bool> {
        let created = self.store.ensure_privacy_record(user_id).await?;
        if created {
            info!("Created privacy record for user {}", user_id);
        }
        Ok(created)
    }

    /// 当前设置；缺失记录按默认值（全部 false）处理
    pub async fn settings(&self, user_id: i64) -> Result<PrivacySettings> {
        Ok(self
            .store
            .privacy_settings(user_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn opted_out_of_tracking(&self, user_id: i64) -> Result<bool> {
        Ok(self.settings(user_id).await?.opt_out_tracking)
    }
}
