//! 维度解析器
//!
//! 自然键 → 代理 id。进程内是 moka 读穿缓存 + 按 key 的 single-flight，
//! 进程间靠存储层唯一约束仲裁（`DimensionStore::get_or_create`）。
//! 维度行创建后不可变，所以缓存只会在进程重启时清空。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;
use moka::future::Cache;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::errors::{AnalyticsError, Result};
use crate::storage::{CreationDefaults, DimensionKey, DimensionStore, LookupKind};
use crate::tracking::classifier::{DeviceType, UNKNOWN_MANUFACTURER};
use crate::utils::ip::IpKind;

/// 启动时写入的标准查找值（name, description）
fn canonical_lookups() -> Vec<(LookupKind, &'static str, &'static str)> {
    let mut seeds = vec![
        (LookupKind::IpAddressType, IpKind::V4.lookup_name(), "IP version 4 address"),
        (LookupKind::IpAddressType, IpKind::V6.lookup_name(), "IP version 6 address"),
        (LookupKind::IpAddressType, IpKind::Invalid.lookup_name(), "Unparseable client address"),
        (LookupKind::RequestType, "HTTP", "Plain-text transport"),
        (LookupKind::RequestType, "HTTPS", "TLS transport"),
        (LookupKind::ReferrerType, "HTTP", "Plain-text referrer"),
        (LookupKind::ReferrerType, "HTTPS", "TLS referrer"),
        (LookupKind::Manufacturer, UNKNOWN_MANUFACTURER, "No vendor could be derived"),
    ];
    seeds.extend(
        DeviceType::ALL
            .iter()
            .map(|t| (LookupKind::DeviceType, t.lookup_name(), "")),
    );
    seeds.extend(
        ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
            .into_iter()
            .map(|m| (LookupKind::RequestMethod, m, "")),
    );
    seeds
}

pub struct DimensionResolver {
    store: Arc<dyn DimensionStore>,
    cache: Cache<DimensionKey, i64>,
    /// 预热时见过的查找值
    known: DashSet<DimensionKey>,
    warmed: AtomicBool,
}

impl DimensionResolver {
    pub fn new(store: Arc<dyn DimensionStore>, capacity: u64) -> Self {
        Self {
            store,
            cache: Cache::builder().max_capacity(capacity).build(),
            known: DashSet::new(),
            warmed: AtomicBool::new(false),
        }
    }

    /// 解析维度 id，必要时创建
    ///
    /// 同一进程内对同一 key 的并发未命中只会触发一次 `get_or_create`，
    /// 其余调用方等待同一个结果。
    pub async fn resolve(&self, key: DimensionKey, defaults: CreationDefaults) -> Result<i64> {
        let store = Arc::clone(&self.store);
        let lookup_key = key.clone();

        self.cache
            .try_get_with(key, async move {
                debug!("Dimension cache miss: {} {:?}", lookup_key.kind_name(), lookup_key);
                store.get_or_create(&lookup_key, &defaults).await
            })
            .await
            .map_err(|e: Arc<AnalyticsError>| (*e).clone())
    }

    pub async fn resolve_lookup(&self, kind: LookupKind, name: &str) -> Result<i64> {
        self.resolve(DimensionKey::lookup(kind, name), CreationDefaults::default())
            .await
    }

    /// 解析一个"应当已存在"的查找值
    ///
    /// 预热后仍不在已知集合里时记一条 warning，但照常解析。
    pub async fn resolve_expected(&self, kind: LookupKind, name: &str) -> Result<i64> {
        let key = DimensionKey::lookup(kind, name);
        if self.warmed.load(Ordering::Relaxed) && !self.known.contains(&key) {
            let table: &str = kind.into();
            warn!("{:?} is not a known {} value", name, table);
        }
        self.resolve(key, CreationDefaults::default()).await
    }

    /// 写入标准查找值并预热全部查找表
    pub async fn bootstrap(&self) -> Result<usize> {
        for (kind, name, description) in canonical_lookups() {
            let defaults = CreationDefaults {
                description: description.to_string(),
                ..Default::default()
            };
            self.resolve(DimensionKey::lookup(kind, name), defaults)
                .await?;
        }

        let mut loaded = 0;
        for kind in LookupKind::iter() {
            for (name, id) in self.store.lookup_entries(kind).await? {
                let key = DimensionKey::lookup(kind, name);
                self.known.insert(key.clone());
                self.cache.insert(key, id).await;
                loaded += 1;
            }
        }

        self.warmed.store(true, Ordering::Relaxed);
        info!("Dimension resolver warmed with {} lookup rows", loaded);
        Ok(loaded)
    }

    /// 整张查找表的快照（name → id），供批处理做局部缓存
    pub async fn lookup_snapshot(&self, kind: LookupKind) -> Result<HashMap<String, i64>> {
        Ok(self.store.lookup_entries(kind).await?.into_iter().collect())
    }

    pub fn is_known(&self, kind: LookupKind, name: &str) -> bool {
        self.known.contains(&DimensionKey::lookup(kind, name))
    }
}
