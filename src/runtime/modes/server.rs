//! HTTP collector mode
//!
//! 装配 HTTP 服务：健康检查、采集 API，以及被 TrackingMiddleware
//! 包裹的宿主占位处理器。

use actix_web::{
    App, HttpResponse, HttpServer,
    middleware::DefaultHeaders,
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::TrackingMiddleware;
use crate::api::services::{AppStartTime, health_routes, ingest_routes};
use crate::config::StaticConfig;
use crate::runtime::lifetime;

/// 采集 API 请求体上限
const JSON_PAYLOAD_LIMIT: usize = 1024 * 1024;

/// 宿主应用的占位处理器
async fn host_placeholder() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Start the collector: ingestion routes plus the tracking middleware
///
/// Expects `init_logging` to have run already.
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup(config)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let storage = startup.storage.clone();
    let pipeline = startup.pipeline.clone();
    let ingestor = startup.ingestor.clone();
    let db_for_shutdown = storage.get_db().clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(ingestor.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(web::PayloadConfig::new(JSON_PAYLOAD_LIMIT))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .service(health_routes())
            .service(ingest_routes())
            .service(
                web::scope("")
                    .wrap(TrackingMiddleware::new(pipeline.clone()))
                    .default_service(web::to(host_placeholder)),
            )
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(db_for_shutdown) => {
            warn!("Graceful shutdown completed");
        }
    }

    Ok(())
}
