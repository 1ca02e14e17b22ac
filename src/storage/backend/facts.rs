//! 事实表写入：requests、请求头关联、performance_entries

use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};
use tracing::debug;

use migration::entities::{performance_entry, request, request_header_link};

use super::SeaOrmStorage;
use super::retry;
use crate::errors::{AnalyticsError, Result};
use crate::storage::models::{NewPerformanceEntry, RequestFact};
use crate::storage::traits::FactSink;

fn request_to_active_model(fact: &RequestFact) -> request::ActiveModel {
    request::ActiveModel {
        request_type_id: Set(fact.request_type_id),
        user_id: Set(fact.user_id),
        referrer_id: Set(fact.referrer_id),
        method_id: Set(fact.method_id),
        ip_address_id: Set(fact.ip_address_id),
        device_id: Set(fact.device_id),
        browser_id: Set(fact.browser_id),
        operating_system_id: Set(fact.operating_system_id),
        url_id: Set(fact.url_id),
        user_agent_id: Set(fact.user_agent_id),
        is_ajax: Set(fact.is_ajax),
        requested_at: Set(fact.requested_at),
        is_internal: Set(fact.is_internal),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
}

fn entry_to_active_model(
    entry: NewPerformanceEntry,
    now: chrono::DateTime<chrono::Utc>,
) -> performance_entry::ActiveModel {
    performance_entry::ActiveModel {
        entry_type_id: Set(entry.entry_type_id),
        name: Set(entry.name),
        start_time: Set(entry.start_time),
        duration: Set(entry.duration),
        data: Set(entry.data),
        created_at: Set(now),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl FactSink for SeaOrmStorage {
    async fn insert_request(&self, fact: RequestFact) -> Result<i64> {
        let model = request_to_active_model(&fact);
        let db = &self.db;

        let result = retry::with_retry("insert_request", self.retry_config, || {
            let model = model.clone();
            async move { request::Entity::insert(model).exec(db).await }
        })
        .await
        .map_err(|e| {
            AnalyticsError::database_operation(format!("Failed to insert request fact: {}", e))
        })?;

        Ok(result.last_insert_id)
    }

    async fn link_request_headers(&self, request_id: i64, header_value_ids: &[i64]) -> Result<()> {
        if header_value_ids.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now();
        let models: Vec<request_header_link::ActiveModel> = header_value_ids
            .iter()
            .map(|header_value_id| request_header_link::ActiveModel {
                request_id: Set(request_id),
                header_value_id: Set(*header_value_id),
                is_internal: Set(false),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();
        let db = &self.db;

        retry::with_retry("link_request_headers", self.retry_config, || {
            let models = models.clone();
            async move {
                request_header_link::Entity::insert_many(models)
                    .on_conflict(
                        OnConflict::columns([
                            request_header_link::Column::RequestId,
                            request_header_link::Column::HeaderValueId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(db)
                    .await
            }
        })
        .await
        .map_err(|e| {
            AnalyticsError::database_operation(format!(
                "Failed to link headers to request {}: {}",
                request_id, e
            ))
        })?;

        Ok(())
    }

    async fn insert_performance_entries(&self, entries: Vec<NewPerformanceEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let total = entries.len();
        let now = chrono::Utc::now();
        let models: Vec<performance_entry::ActiveModel> = entries
            .into_iter()
            .map(|entry| entry_to_active_model(entry, now))
            .collect();
        let db = &self.db;

        retry::with_retry("insert_performance_entries", self.retry_config, || {
            let models = models.clone();
            async move {
                performance_entry::Entity::insert_many(models)
                    .exec_without_returning(db)
                    .await
            }
        })
        .await
        .map_err(|e| {
            AnalyticsError::database_operation(format!(
                "Failed to insert {} performance entries: {}",
                total, e
            ))
        })?;

        debug!("Inserted {} performance entries", total);
        Ok(total)
    }
}
