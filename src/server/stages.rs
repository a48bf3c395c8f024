use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;
use serde_json::json;
use tracing::{debug, warn};

use super::pipeline::{Pipeline, Stage, StageOutcome};
use super::request::TransportRequest;
use super::response::{ContentType, TransportResponse};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::middleware::{MetricsMiddleware, Middleware, TracingMiddleware};

/// `GET /health` returns `{"status": "ok"}`.
pub struct HealthStage {
    metrics: Option<Arc<MetricsMiddleware>>,
}

impl HealthStage {
    #[must_use]
    pub fn new(metrics: Option<Arc<MetricsMiddleware>>) -> Self {
        Self { metrics }
    }
}

impl Stage for HealthStage {
    fn name(&self) -> &'static str {
        "health"
    }

    fn process<'a>(&'a self, req: &'a TransportRequest) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            if req.method != Method::GET || req.path != "/health" {
                return StageOutcome::Next;
            }
            if let Some(metrics) = &self.metrics {
                metrics.inc_top_level_request();
            }
            StageOutcome::Respond(TransportResponse::json(200, &json!({ "status": "ok" })))
        })
    }
}

/// `GET /metrics` in Prometheus text format.
pub struct MetricsStage {
    metrics: Arc<MetricsMiddleware>,
}

impl MetricsStage {
    #[must_use]
    pub fn new(metrics: Arc<MetricsMiddleware>) -> Self {
        Self { metrics }
    }
}

impl Stage for MetricsStage {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(&'a self, req: &'a TransportRequest) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            if req.method != Method::GET || req.path != "/metrics" {
                return StageOutcome::Next;
            }
            self.metrics.inc_top_level_request();
            StageOutcome::Respond(TransportResponse::text(self.metrics.render_prometheus()))
        })
    }
}

/// Claims every request under the route prefix, whatever its method, and runs
/// it through the [`Dispatcher`], expecting the action to yield the response
/// body bytes.
///
/// The content type follows the decoder's stripped extension. Fallthrough
/// results pass the request on; fatal dispatch errors become a 500 JSON body.
pub struct DynamicDispatchStage {
    dispatcher: Dispatcher,
    route_prefix: String,
    metrics: Option<Arc<MetricsMiddleware>>,
}

impl DynamicDispatchStage {
    /// `route_prefix` is of the form `/dynamic/`.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, route_prefix: impl Into<String>) -> Self {
        Self {
            dispatcher,
            route_prefix: route_prefix.into(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsMiddleware>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn claims(&self, req: &TransportRequest) -> bool {
        req.path
            .get(..self.route_prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.route_prefix))
    }

    fn record(&self, f: impl FnOnce(&MetricsMiddleware)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

impl Stage for DynamicDispatchStage {
    fn name(&self) -> &'static str {
        "dynamic-dispatch"
    }

    fn process<'a>(&'a self, req: &'a TransportRequest) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            if !self.claims(req) {
                return StageOutcome::Next;
            }
            match self.dispatcher.dispatch_path::<Vec<u8>>(&req.path).await {
                Ok(DispatchOutcome::Completed(body)) => {
                    self.record(MetricsMiddleware::inc_dispatched);
                    let ext = self.dispatcher.decoder().matched_extension(&req.path);
                    StageOutcome::Respond(TransportResponse::bytes(
                        ContentType::from_extension(ext),
                        body,
                    ))
                }
                Ok(DispatchOutcome::NotApplicable(reason)) => {
                    self.record(MetricsMiddleware::inc_not_applicable);
                    debug!(
                        request_id = %req.request_id,
                        reason = %reason,
                        "dynamic dispatch passed"
                    );
                    StageOutcome::Next
                }
                Err(err) => {
                    self.record(MetricsMiddleware::inc_fault);
                    warn!(
                        request_id = %req.request_id,
                        kind = err.kind(),
                        error = %err,
                        "dynamic dispatch failed"
                    );
                    StageOutcome::Respond(TransportResponse::dispatch_error(&err))
                }
            }
        })
    }
}

/// Health, metrics and dynamic dispatch stages in that order, wrapped by
/// metrics and tracing middleware.
#[must_use]
pub fn standard_pipeline(
    dispatcher: Dispatcher,
    route_prefix: &str,
    metrics: Arc<MetricsMiddleware>,
) -> Pipeline {
    Pipeline::new()
        .with_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>)
        .with_middleware(Arc::new(TracingMiddleware))
        .with_stage(Arc::new(HealthStage::new(Some(Arc::clone(&metrics)))))
        .with_stage(Arc::new(MetricsStage::new(Arc::clone(&metrics))))
        .with_stage(Arc::new(
            DynamicDispatchStage::new(dispatcher, route_prefix).with_metrics(metrics),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{demo_registry, demo_services, placeholder_jpeg};
    use crate::dispatcher::PathDecoder;

    fn pipeline() -> (Pipeline, Arc<MetricsMiddleware>) {
        let dispatcher = Dispatcher::new(
            Arc::new(demo_registry("App.Controllers").unwrap()),
            Arc::new(demo_services()),
        );
        let metrics = Arc::new(MetricsMiddleware::new());
        (standard_pipeline(dispatcher, "/dynamic/", metrics.clone()), metrics)
    }

    fn get(path: &str) -> TransportRequest {
        TransportRequest::new(Method::GET, path)
    }

    #[tokio::test]
    async fn photo_is_served_as_jpeg() {
        let (pipeline, metrics) = pipeline();
        let res = pipeline.handle(&get("/dynamic/account/photo/1045.jpg")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.content_type, ContentType::Jpeg);
        assert_eq!(res.body, placeholder_jpeg(1045));
        assert_eq!(metrics.dispatched(), 1);
    }

    #[tokio::test]
    async fn any_method_under_prefix_is_dispatched() {
        let (pipeline, metrics) = pipeline();
        for method in [Method::POST, Method::PUT, Method::HEAD, Method::DELETE] {
            let req = TransportRequest::new(method.clone(), "/dynamic/account/photo/1045.jpg");
            let res = pipeline.handle(&req).await;
            assert_eq!(res.status, 200, "{method}");
            assert_eq!(res.body, placeholder_jpeg(1045));
        }
        assert_eq!(metrics.dispatched(), 4);
    }

    #[tokio::test]
    async fn content_type_uses_configured_extension() {
        let dispatcher = Dispatcher::new(
            Arc::new(demo_registry("App.Controllers").unwrap()),
            Arc::new(demo_services()),
        )
        .with_decoder(PathDecoder::new("Controller", Some(".png")));
        let pipeline = standard_pipeline(dispatcher, "/dynamic/", Arc::new(MetricsMiddleware::new()));

        let res = pipeline.handle(&get("/dynamic/echo/echo/hi.png")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.content_type, ContentType::Png);
        assert_eq!(res.body, b"hi");

        let res = pipeline.handle(&get("/dynamic/echo/echo/hi.jpg")).await;
        assert_eq!(res.content_type, ContentType::OctetStream);
        assert_eq!(res.body, b"hi.jpg");
    }

    #[tokio::test]
    async fn unknown_handler_falls_through_to_not_found() {
        let (pipeline, metrics) = pipeline();
        let res = pipeline.handle(&get("/dynamic/unknownthing/x")).await;
        assert_eq!(res.status, 404);
        assert_eq!(metrics.not_applicable(), 1);
        assert_eq!(metrics.faults(), 0);
    }

    #[tokio::test]
    async fn paths_outside_prefix_are_not_dispatched() {
        let (pipeline, metrics) = pipeline();
        let res = pipeline.handle(&get("/other/path")).await;
        assert_eq!(res.status, 404);
        assert_eq!(metrics.not_applicable(), 0);
        assert_eq!(metrics.dispatched(), 0);
    }

    #[tokio::test]
    async fn missing_argument_is_server_error() {
        let (pipeline, metrics) = pipeline();
        let res = pipeline.handle(&get("/dynamic/account/photo")).await;
        assert_eq!(res.status, 500);
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(body["error"], "ArityMismatch");
        assert_eq!(metrics.faults(), 1);
    }

    #[tokio::test]
    async fn health_and_metrics() {
        let (pipeline, metrics) = pipeline();
        assert_eq!(pipeline.handle(&get("/health")).await.status, 200);
        let res = pipeline.handle(&get("/metrics")).await;
        assert_eq!(res.content_type, ContentType::PlainText);
        assert!(String::from_utf8(res.body).unwrap().contains("dyndispatch_requests_total"));
        assert_eq!(metrics.top_level_request_count(), 2);
    }
}
