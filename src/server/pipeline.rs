use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info_span, Instrument};

use super::request::TransportRequest;
use super::response::TransportResponse;
use crate::middleware::Middleware;

/// Result of one stage looking at a request.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage handled the request.
    Respond(TransportResponse),
    /// Not for this stage; try the next one.
    Next,
}

/// One link in the request pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn process<'a>(&'a self, req: &'a TransportRequest) -> BoxFuture<'a, StageOutcome>;
}

/// Ordered stages wrapped by middleware. A request nobody claims gets 404.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Stage names in evaluation order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn handle(&self, req: &TransportRequest) -> TransportResponse {
        let span = info_span!(
            "request",
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path
        );
        async {
            let started = Instant::now();
            let early = self.middlewares.iter().find_map(|mw| mw.before(req));
            let response = match early {
                Some(response) => response,
                None => self.run_stages(req).await,
            };
            let latency = started.elapsed();
            for mw in &self.middlewares {
                mw.after(req, &response, latency);
            }
            response
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, req: &TransportRequest) -> TransportResponse {
        for stage in &self.stages {
            if let StageOutcome::Respond(response) = stage.process(req).await {
                debug!(stage = stage.name(), status = response.status, "stage responded");
                return response;
            }
        }
        debug!("no stage claimed request");
        TransportResponse::not_found()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
