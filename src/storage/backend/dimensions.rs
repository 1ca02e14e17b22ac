//! 维度表的查询与原子创建

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use xxhash_rust::xxh64::xxh64;

use migration::entities::{
    browser, device, ip_address, operating_system, referrer, request_header_value, url, user_agent,
};

use super::SeaOrmStorage;
use crate::errors::{AnalyticsError, Result};
use crate::storage::models::{CreationDefaults, DimensionKey, LookupKind};
use crate::storage::traits::DimensionStore;

/// 计算长值的摘要（xxHash64，16 位 hex）
pub fn value_hash(value: &str) -> String {
    format!("{:016x}", xxh64(value.as_bytes(), 0))
}

/// 把 LookupKind 分派到对应的查找表实体模块
macro_rules! with_lookup_entity {
    ($kind:expr, $entity:ident => $body:block) => {
        match $kind {
            LookupKind::DeviceType => {
                use migration::entities::device_type as $entity;
                $body
            }
            LookupKind::Manufacturer => {
                use migration::entities::manufacturer as $entity;
                $body
            }
            LookupKind::IpAddressType => {
                use migration::entities::ip_address_type as $entity;
                $body
            }
            LookupKind::ReferrerType => {
                use migration::entities::referrer_type as $entity;
                $body
            }
            LookupKind::RequestMethod => {
                use migration::entities::request_method as $entity;
                $body
            }
            LookupKind::RequestType => {
                use migration::entities::request_type as $entity;
                $body
            }
            LookupKind::PerformanceEntryType => {
                use migration::entities::performance_entry_type as $entity;
                $body
            }
            LookupKind::RequestHeader => {
                use migration::entities::request_header as $entity;
                $body
            }
        }
    };
}

/// 把 `ON CONFLICT DO NOTHING` 的插入结果折叠成 "新 id / 已存在"
fn insert_outcome(result: std::result::Result<i64, DbErr>, key: &DimensionKey) -> Result<Option<i64>> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(DbErr::RecordNotInserted) => Ok(None),
        Err(e) => {
            // 部分后端在 do_nothing 时返回特殊错误，或者仍然报唯一约束冲突
            let err_str = e.to_string().to_lowercase();
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_)))
                || err_str.contains("no rows")
                || err_str.contains("record not inserted")
            {
                Ok(None)
            } else {
                Err(AnalyticsError::database_operation(format!(
                    "Failed to create {} dimension: {}",
                    key.kind_name(),
                    e
                )))
            }
        }
    }
}

fn find_error(key: &DimensionKey, e: DbErr) -> AnalyticsError {
    AnalyticsError::database_operation(format!(
        "Failed to look up {} dimension: {}",
        key.kind_name(),
        e
    ))
}

#[async_trait::async_trait]
impl DimensionStore for SeaOrmStorage {
    async fn find_dimension(&self, key: &DimensionKey) -> Result<Option<i64>> {
        let db = &self.db;
        let found = match key {
            DimensionKey::Lookup { kind, name } => with_lookup_entity!(kind, entity => {
                entity::Entity::find()
                    .filter(entity::Column::Name.eq(name.as_str()))
                    .one(db)
                    .await
                    .map(|m| m.map(|m| m.id))
            }),
            DimensionKey::Browser { name, version } => browser::Entity::find()
                .filter(browser::Column::Name.eq(name.as_str()))
                .filter(browser::Column::Version.eq(version.as_str()))
                .one(db)
                .await
                .map(|m| m.map(|m| m.id)),
            DimensionKey::OperatingSystem {
                manufacturer_id,
                name,
                version,
            } => {
                operating_system::Entity::find()
                    .filter(operating_system::Column::ManufacturerId.eq(*manufacturer_id))
                    .filter(operating_system::Column::Name.eq(name.as_str()))
                    .filter(operating_system::Column::Version.eq(version.as_str()))
                    .one(db)
                    .await
                    .map(|m| m.map(|m| m.id))
            }
            DimensionKey::Device {
                device_type_id,
                manufacturer_id,
                name,
            } => {
                device::Entity::find()
                    .filter(device::Column::DeviceTypeId.eq(*device_type_id))
                    .filter(device::Column::ManufacturerId.eq(*manufacturer_id))
                    .filter(device::Column::Name.eq(name.as_str()))
                    .one(db)
                    .await
                    .map(|m| m.map(|m| m.id))
            }
            DimensionKey::IpAddress {
                ip_address_type_id,
                value,
            } => ip_address::Entity::find()
                .filter(ip_address::Column::IpAddressTypeId.eq(*ip_address_type_id))
                .filter(ip_address::Column::ValueHash.eq(value_hash(value)))
                .filter(ip_address::Column::Value.eq(value.as_str()))
                .one(db)
                .await
                .map(|m| m.map(|m| m.id)),
            DimensionKey::Referrer {
                referrer_type_id,
                value,
            } => referrer::Entity::find()
                .filter(referrer::Column::ReferrerTypeId.eq(*referrer_type_id))
                .filter(referrer::Column::ValueHash.eq(value_hash(value)))
                .filter(referrer::Column::Value.eq(value.as_str()))
                .one(db)
                .await
                .map(|m| m.map(|m| m.id)),
            DimensionKey::Url(value) => url::Entity::find()
                .filter(url::Column::ValueHash.eq(value_hash(value)))
                .filter(url::Column::Value.eq(value.as_str()))
                .one(db)
                .await
                .map(|m| m.map(|m| m.id)),
            DimensionKey::UserAgent(value) => user_agent::Entity::find()
                .filter(user_agent::Column::ValueHash.eq(value_hash(value)))
                .filter(user_agent::Column::Value.eq(value.as_str()))
                .one(db)
                .await
                .map(|m| m.map(|m| m.id)),
            DimensionKey::RequestHeaderValue { header_id, value } => {
                request_header_value::Entity::find()
                    .filter(request_header_value::Column::HeaderId.eq(*header_id))
                    .filter(request_header_value::Column::ValueHash.eq(value_hash(value)))
                    .filter(request_header_value::Column::Value.eq(value.as_str()))
                    .one(db)
                    .await
                    .map(|m| m.map(|m| m.id))
            }
        };

        found.map_err(|e| find_error(key, e))
    }

    async fn create_dimension(
        &self,
        key: &DimensionKey,
        defaults: &CreationDefaults,
    ) -> Result<Option<i64>> {
        let db = &self.db;
        let now = chrono::Utc::now();
        let version = &defaults.version;

        let result = match key {
            DimensionKey::Lookup { kind, name } => with_lookup_entity!(kind, entity => {
                let model = entity::ActiveModel {
                    name: Set(name.clone()),
                    description: Set(defaults.description.clone()),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                entity::Entity::insert(model)
                    .on_conflict(
                        OnConflict::column(entity::Column::Name)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }),
            DimensionKey::Browser { name, version: raw } => {
                let model = browser::ActiveModel {
                    name: Set(name.clone()),
                    version: Set(raw.clone()),
                    major_version: Set(version.major),
                    minor_version: Set(version.minor),
                    build_maintenance_version: Set(version.build),
                    revision_build_version: Set(version.revision),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                browser::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([browser::Column::Name, browser::Column::Version])
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::OperatingSystem {
                manufacturer_id,
                name,
                version: raw,
            } => {
                let model = operating_system::ActiveModel {
                    manufacturer_id: Set(*manufacturer_id),
                    name: Set(name.clone()),
                    version: Set(raw.clone()),
                    major_version: Set(version.major),
                    minor_version: Set(version.minor),
                    build_maintenance_version: Set(version.build),
                    revision_build_version: Set(version.revision),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                operating_system::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([
                            operating_system::Column::ManufacturerId,
                            operating_system::Column::Name,
                            operating_system::Column::Version,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::Device {
                device_type_id,
                manufacturer_id,
                name,
            } => {
                let model = device::ActiveModel {
                    device_type_id: Set(*device_type_id),
                    manufacturer_id: Set(*manufacturer_id),
                    name: Set(name.clone()),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                device::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([
                            device::Column::DeviceTypeId,
                            device::Column::ManufacturerId,
                            device::Column::Name,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::IpAddress {
                ip_address_type_id,
                value,
            } => {
                let model = ip_address::ActiveModel {
                    ip_address_type_id: Set(*ip_address_type_id),
                    value: Set(value.clone()),
                    value_hash: Set(value_hash(value)),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                ip_address::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([
                            ip_address::Column::IpAddressTypeId,
                            ip_address::Column::ValueHash,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::Referrer {
                referrer_type_id,
                value,
            } => {
                let model = referrer::ActiveModel {
                    referrer_type_id: Set(*referrer_type_id),
                    value: Set(value.clone()),
                    value_hash: Set(value_hash(value)),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                referrer::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([
                            referrer::Column::ReferrerTypeId,
                            referrer::Column::ValueHash,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::Url(value) => {
                let model = url::ActiveModel {
                    value: Set(value.clone()),
                    value_hash: Set(value_hash(value)),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                url::Entity::insert(model)
                    .on_conflict(
                        OnConflict::column(url::Column::ValueHash)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::UserAgent(value) => {
                let model = user_agent::ActiveModel {
                    value: Set(value.clone()),
                    value_hash: Set(value_hash(value)),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                user_agent::Entity::insert(model)
                    .on_conflict(
                        OnConflict::column(user_agent::Column::ValueHash)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
            DimensionKey::RequestHeaderValue { header_id, value } => {
                let model = request_header_value::ActiveModel {
                    header_id: Set(*header_id),
                    value: Set(value.clone()),
                    value_hash: Set(value_hash(value)),
                    is_internal: Set(defaults.is_internal),
                    created_at: Set(now),
                    ..Default::default()
                };
                request_header_value::Entity::insert(model)
                    .on_conflict(
                        OnConflict::columns([
                            request_header_value::Column::HeaderId,
                            request_header_value::Column::ValueHash,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec(db)
                    .await
                    .map(|r| r.last_insert_id)
            }
        };

        insert_outcome(result, key)
    }

    async fn lookup_entries(&self, kind: LookupKind) -> Result<Vec<(String, i64)>> {
        let db = &self.db;
        let rows = with_lookup_entity!(kind, entity => {
            entity::Entity::find()
                .all(db)
                .await
                .map(|rows| rows.into_iter().map(|m| (m.name, m.id)).collect::<Vec<_>>())
        });

        rows.map_err(|e| {
            let table: &str = kind.into();
            AnalyticsError::database_operation(format!(
                "Failed to prefetch {} lookup table: {}",
                table, e
            ))
        })
    }
}
