use std::time::Duration;

use tracing::{debug, info, warn};

use super::Middleware;
use crate::server::{TransportRequest, TransportResponse};

/// Logs request start and completion with the request id.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &TransportRequest) -> Option<TransportResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            "request started"
        );
        None
    }

    fn after(&self, req: &TransportRequest, res: &TransportResponse, latency: Duration) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        if res.status >= 500 {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                latency_ms,
                "request failed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                latency_ms,
                "request completed"
            );
        }
    }
}
