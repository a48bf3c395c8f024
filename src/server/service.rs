use std::io;
use std::sync::Arc;

use may::sync::mpsc;
use may_minihttp::{HttpService, Request, Response};
use tokio::runtime::Handle;
use tracing::error;

use super::pipeline::Pipeline;
use crate::middleware::MetricsMiddleware;
use super::request::parse_request;
use super::response::{write_response, TransportResponse};

/// `may_minihttp` service: parses on the connection coroutine, runs the
/// pipeline on the tokio runtime, and parks the coroutine on a `may`
/// channel until the response comes back.
#[derive(Clone)]
pub struct AppService {
    pipeline: Arc<Pipeline>,
    runtime: Handle,
    metrics: Option<Arc<MetricsMiddleware>>,
}

impl AppService {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, runtime: Handle) -> Self {
        Self {
            pipeline,
            runtime,
            metrics: None,
        }
    }

    /// Record the connection coroutine's stack size on every call.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsMiddleware>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        if let Some(metrics) = &self.metrics {
            if may::coroutine::is_coroutine() {
                metrics.record_stack_size(may::coroutine::current().stack_size());
            }
        }
        let request = parse_request(req);
        let request_id = request.request_id;
        let pipeline = Arc::clone(&self.pipeline);
        let (tx, rx) = mpsc::channel();

        self.runtime.spawn(async move {
            let response = pipeline.handle(&request).await;
            // The connection may be gone; nothing to do then.
            if tx.send(response).is_err() {
                tracing::debug!(request_id = %request.request_id, "response receiver dropped");
            }
        });

        let response = rx.recv().unwrap_or_else(|_| {
            error!(request_id = %request_id, "pipeline task ended without a response");
            TransportResponse::json(
                500,
                &serde_json::json!({ "error": "Internal", "message": "request task aborted" }),
            )
        });
        write_response(res, response);
        Ok(())
    }
}

impl std::fmt::Debug for AppService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppService")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
