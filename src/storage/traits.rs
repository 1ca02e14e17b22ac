//! 存储接缝
//!
//! 核心逻辑只依赖这些 trait，`SeaOrmStorage` 是唯一的生产实现。

use tracing::debug;

use super::models::{
    CreationDefaults, DimensionKey, LookupKind, NewPerformanceEntry, PrivacySettings, RequestFact,
};
use crate::errors::{AnalyticsError, Result};

/// 维度表读写
#[async_trait::async_trait]
pub trait DimensionStore: Send + Sync {
    /// 按自然键查询维度 id
    async fn find_dimension(&self, key: &DimensionKey) -> Result<Option<i64>>;

    /// 原子性创建维度（`INSERT ... ON CONFLICT DO NOTHING`）
    ///
    /// - `Ok(Some(id))`: 本次插入成功
    /// - `Ok(None)`: 自然键已存在，未插入
    async fn create_dimension(
        &self,
        key: &DimensionKey,
        defaults: &CreationDefaults,
    ) -> Result<Option<i64>>;

    /// 读取整张查找表（name, id），用于预热
    async fn lookup_entries(&self, kind: LookupKind) -> Result<Vec<(String, i64)>>;

    /// find → 原子创建 → 再次 find
    ///
    /// 创建冲突说明另一写入方抢先插入，此时重新查询得到同一行。
    async fn get_or_create(&self, key: &DimensionKey, defaults: &CreationDefaults) -> Result<i64> {
        if let Some(id) = self.find_dimension(key).await? {
            return Ok(id);
        }

        if let Some(id) = self.create_dimension(key, defaults).await? {
            return Ok(id);
        }

        debug!("Lost create race for {} dimension, re-fetching", key.kind_name());
        self.find_dimension(key).await?.ok_or_else(|| {
            AnalyticsError::dimension_unresolved(format!(
                "{} dimension conflicted on create but could not be re-fetched: {:?}",
                key.kind_name(),
                key
            ))
        })
    }
}

/// 事实表写入
#[async_trait::async_trait]
pub trait FactSink: Send + Sync {
    /// 写入一行 Request 事实，返回新行 id
    async fn insert_request(&self, fact: RequestFact) -> Result<i64>;

    /// 关联请求与已解析的请求头取值
    async fn link_request_headers(&self, request_id: i64, header_value_ids: &[i64]) -> Result<()>;

    /// 单条语句批量写入性能条目，返回写入条数
    async fn insert_performance_entries(&self, entries: Vec<NewPerformanceEntry>) -> Result<usize>;
}

/// 用户隐私设置
#[async_trait::async_trait]
pub trait PrivacyStore: Send + Sync {
    /// 确保用户存在隐私记录；返回是否新建
    async fn ensure_privacy_record(&self, user_id: i64) -> Result<bool>;

    async fn privacy_settings(&self, user_id: i64) -> Result<Option<PrivacySettings>>;
}
