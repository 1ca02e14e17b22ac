//! Tracking middleware
//!
//! 在调用被包裹的服务之前执行一次采集流水线。采集结果只写日志，
//! 不会改变响应，也不会让请求失败。

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

use crate::tracking::{RequestSnapshot, TrackOutcome, TrackingPipeline};

/// 采集中间件工厂
#[derive(Clone)]
pub struct TrackingMiddleware {
    pipeline: Arc<TrackingPipeline>,
}

impl TrackingMiddleware {
    pub fn new(pipeline: Arc<TrackingPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TrackingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TrackingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TrackingService {
            service: Rc::new(service),
            pipeline: self.pipeline.clone(),
        }))
    }
}

pub struct TrackingService<S> {
    service: Rc<S>,
    pipeline: Arc<TrackingPipeline>,
}

impl<S, B> Service<ServiceRequest> for TrackingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let pipeline = self.pipeline.clone();

        // 关闭采集时直接透传
        if !pipeline.config().enabled {
            return Box::pin(async move { srv.call(req).await });
        }

        let snapshot = RequestSnapshot::from_http_request(req.request(), pipeline.config());

        Box::pin(async move {
            match pipeline.track(&snapshot).await {
                TrackOutcome::Tracked(id) => trace!("request {} tracked as {}", snapshot.path, id),
                TrackOutcome::Skipped(reason) => {
                    trace!("request {} skipped: {:?}", snapshot.path, reason)
                }
                // 失败已在流水线内部记录
                TrackOutcome::Dropped(_) => {}
            }

            srv.call(req).await
        })
    }
}
