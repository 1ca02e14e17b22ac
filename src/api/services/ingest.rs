//! 采集 API
//!
//! `/api/page-view/`、`/api/event/`、`/api/performance/`。
//! 无论批内成败，HTTP 状态都是 200，错误通过响应体的 `error` 字段表达。

use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::tracking::{IngestResponse, PerformanceIngestor};

/// 只带 error 标记的确认响应
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Acknowledgement {
    pub error: bool,
}

impl Acknowledgement {
    fn ok() -> HttpResponse {
        HttpResponse::Ok().json(Acknowledgement { error: false })
    }
}

pub struct IngestService;

impl IngestService {
    /// GET 请求的确认
    pub async fn acknowledge() -> impl Responder {
        Acknowledgement::ok()
    }

    pub async fn page_view(_body: web::Bytes) -> impl Responder {
        Acknowledgement::ok()
    }

    /// 解析后丢弃；无法解析时 error 为 true
    pub async fn event(body: web::Bytes) -> impl Responder {
        match serde_json::from_slice::<Value>(&body) {
            Ok(_) => Acknowledgement::ok(),
            Err(e) => {
                debug!("Discarding malformed event payload: {}", e);
                HttpResponse::Ok().json(Acknowledgement { error: true })
            }
        }
    }

    pub async fn performance(
        ingestor: web::Data<Arc<PerformanceIngestor>>,
        body: web::Bytes,
    ) -> impl Responder {
        let payload = match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Malformed performance payload: {}", e);
                return HttpResponse::Ok().json(IngestResponse {
                    error: true,
                    message: format!("Invalid JSON: {}", e),
                });
            }
        };

        HttpResponse::Ok().json(ingestor.ingest(payload).await)
    }
}

pub fn ingest_routes() -> actix_web::Scope {
    web::scope("/api")
        .service(
            web::resource("/page-view/")
                .route(web::get().to(IngestService::acknowledge))
                .route(web::post().to(IngestService::page_view)),
        )
        .service(
            web::resource("/event/")
                .route(web::get().to(IngestService::acknowledge))
                .route(web::post().to(IngestService::event)),
        )
        .service(
            web::resource("/performance/")
                .route(web::get().to(IngestService::acknowledge))
                .route(web::post().to(IngestService::performance)),
        )
}
