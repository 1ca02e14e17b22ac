//! 浏览器性能条目批量写入
//!
//! 每个条目单独校验；失败条目计数但不影响同批其它条目，
//! 通过校验的条目在整批处理完后一次性写入。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::{AnalyticsError, Result};
use crate::storage::{FactSink, LookupKind, NewPerformanceEntry};
use crate::tracking::resolver::DimensionResolver;

/// name 列长度上限
pub const MAX_ENTRY_NAME_LEN: usize = 500;

pub const SUCCESS_MESSAGE: &str = "Success";
pub const NOT_AN_ARRAY_MESSAGE: &str = "Must send an array of performance entries";

/// 单个 PerformanceEntry（Resource Timing / User Timing 等）
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceEntryPayload {
    #[serde(rename = "entryType")]
    pub entry_type: String,
    pub name: String,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    /// 其余字段原样保存到 data 列
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PerformanceEntryPayload {
    /// 解析并校验一个数组元素
    pub fn from_value(value: Value) -> Result<Self> {
        let entry: Self = serde_json::from_value(value)?;
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.entry_type.trim().is_empty() {
            return Err(AnalyticsError::validation("entryType must not be empty"));
        }
        let len = self.name.chars().count();
        if len > MAX_ENTRY_NAME_LEN {
            return Err(AnalyticsError::validation(format!(
                "name is {} characters long, the limit is {}",
                len, MAX_ENTRY_NAME_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub error: bool,
    pub message: String,
}

impl IngestResponse {
    fn success() -> Self {
        Self {
            error: false,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

pub struct PerformanceIngestor {
    resolver: Arc<DimensionResolver>,
    sink: Arc<dyn FactSink>,
    max_batch_entries: usize,
}

impl PerformanceIngestor {
    pub fn new(
        resolver: Arc<DimensionResolver>,
        sink: Arc<dyn FactSink>,
        max_batch_entries: usize,
    ) -> Self {
        Self {
            resolver,
            sink,
            max_batch_entries,
        }
    }

    pub async fn ingest(&self, payload: Value) -> IngestResponse {
        let Value::Array(items) = payload else {
            return IngestResponse::failure(NOT_AN_ARRAY_MESSAGE);
        };

        let total = items.len();
        if total > self.max_batch_entries {
            warn!(
                "Rejected performance batch of {} entries (limit {})",
                total, self.max_batch_entries
            );
            return IngestResponse::failure(format!(
                "Batch of {} performance entries exceeds the limit of {}",
                total, self.max_batch_entries
            ));
        }

        // 批内局部缓存，用已有类型预填充
        let mut entry_types = match self
            .resolver
            .lookup_snapshot(LookupKind::PerformanceEntryType)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to prefetch performance entry types: {}", e);
                HashMap::new()
            }
        };

        let mut entries = Vec::with_capacity(total);
        let mut rejected = 0usize;
        let mut first_error: Option<String> = None;

        for item in items {
            match self.prepare(item, &mut entry_types).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Rejected performance entry: {}", e.message());
                    rejected += 1;
                    first_error.get_or_insert_with(|| e.message().to_string());
                }
            }
        }

        if !entries.is_empty() {
            match self.sink.insert_performance_entries(entries).await {
                Ok(count) => debug!("Stored {} of {} performance entries", count, total),
                Err(e) => {
                    warn!("Performance entry bulk insert failed: {}", e);
                    return IngestResponse::failure(e.to_string());
                }
            }
        }

        match first_error {
            None => IngestResponse::success(),
            Some(reason) => IngestResponse::failure(format!(
                "{} of {} performance entries rejected: {}",
                rejected, total, reason
            )),
        }
    }

    async fn prepare(
        &self,
        item: Value,
        entry_types: &mut HashMap<String, i64>,
    ) -> Result<NewPerformanceEntry> {
        let entry = PerformanceEntryPayload::from_value(item)?;

        let entry_type_id = match entry_types.get(&entry.entry_type) {
            Some(id) => *id,
            None => {
                let id = self
                    .resolver
                    .resolve_lookup(LookupKind::PerformanceEntryType, &entry.entry_type)
                    .await?;
                entry_types.insert(entry.entry_type.clone(), id);
                id
            }
        };

        Ok(NewPerformanceEntry {
            entry_type_id,
            name: entry.name,
            start_time: entry.start_time,
            duration: entry.duration.unwrap_or(0.0),
            data: Value::Object(entry.extra),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_fields_and_extra_data() {
        let entry = PerformanceEntryPayload::from_value(json!({
            "entryType": "resource",
            "name": "https://cdn.example.com/app.css",
            "transferSize": 5120,
            "initiatorType": "link"
        }))
        .unwrap();

        assert_eq!(entry.start_time, None);
        assert_eq!(entry.duration, None);
        assert_eq!(entry.extra.len(), 2);
        assert_eq!(entry.extra["initiatorType"], "link");
        assert!(!entry.extra.contains_key("entryType"));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = PerformanceEntryPayload::from_value(json!({"entryType": "mark"})).unwrap_err();
        assert!(matches!(err, AnalyticsError::Serialization(_)));
        assert!(err.message().contains("name"));
    }

    #[test]
    fn test_empty_entry_type_is_rejected() {
        let err =
            PerformanceEntryPayload::from_value(json!({"entryType": " ", "name": "a"})).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));
    }

    #[test]
    fn test_long_name_is_rejected() {
        let name = "x".repeat(MAX_ENTRY_NAME_LEN + 1);
        let err = PerformanceEntryPayload::from_value(json!({"entryType": "mark", "name": name}))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));

        let name = "x".repeat(MAX_ENTRY_NAME_LEN);
        assert!(
            PerformanceEntryPayload::from_value(json!({"entryType": "mark", "name": name})).is_ok()
        );
    }

    #[test]
    fn test_non_object_entry_is_rejected() {
        assert!(PerformanceEntryPayload::from_value(json!(42)).is_err());
        assert!(PerformanceEntryPayload::from_value(json!({"entryType": "mark", "name": 3})).is_err());
    }

    #[test]
    fn test_null_start_time_is_absent() {
        let entry = PerformanceEntryPayload::from_value(
            json!({"entryType": "mark", "name": "a", "startTime": null, "duration": 1.5}),
        )
        .unwrap();
        assert_eq!(entry.start_time, None);
        assert_eq!(entry.duration, Some(1.5));
    }
}
