use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, trace};

use crate::storage::SeaOrmStorage;

// 进程启动时刻，用于计算 uptime
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time_ms: u64,
}

/// Storage liveness probe
///
/// 只检查数据库连通性，供负载均衡 / k8s 探针使用。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        storage: web::Data<Arc<SeaOrmStorage>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let error = match tokio::time::timeout(Duration::from_secs(5), storage.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                Some(format!("database error: {}", e))
            }
            Err(_) => {
                error!("Storage health check timeout");
                Some("timeout".to_string())
            }
        };

        let now = chrono::Utc::now();
        let healthy = error.is_none();
        let body = HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            backend: storage.backend_name(),
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            error,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        };

        if healthy {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }
}

pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
}
