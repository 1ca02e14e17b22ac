use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{StaticConfig, TrackingConfig};
use crate::storage::SeaOrmStorage;
use crate::tracking::{DimensionResolver, PerformanceIngestor, PrivacyService, TrackingPipeline};

/// 服务运行所需的共享组件，进程内只构造一次
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub resolver: Arc<DimensionResolver>,
    pub pipeline: Arc<TrackingPipeline>,
    pub ingestor: Arc<PerformanceIngestor>,
    pub privacy: PrivacyService,
}

/// 连接数据库、执行迁移并装配服务组件
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let storage = SeaOrmStorage::connect(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let context = build_context(Arc::new(storage), &config.tracking).await?;

    info!(
        "Startup completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(context)
}

/// 在已有存储上装配解析器、流水线与批量写入器，并预热查找表
pub async fn build_context(
    storage: Arc<SeaOrmStorage>,
    tracking: &TrackingConfig,
) -> Result<StartupContext> {
    let resolver = Arc::new(DimensionResolver::new(
        storage.clone(),
        tracking.dimension_cache_capacity,
    ));
    resolver
        .bootstrap()
        .await
        .context("Failed to seed lookup tables")?;

    let privacy = PrivacyService::new(storage.clone());
    let pipeline = Arc::new(TrackingPipeline::new(
        resolver.clone(),
        storage.clone(),
        privacy.clone(),
        tracking.clone(),
    ));
    let ingestor = Arc::new(PerformanceIngestor::new(
        resolver.clone(),
        storage.clone(),
        tracking.max_batch_entries,
    ));

    if !tracking.enabled {
        info!("Request tracking is disabled, middleware will pass requests through");
    }

    Ok(StartupContext {
        storage,
        resolver,
        pipeline,
        ingestor,
        privacy,
    })
}
