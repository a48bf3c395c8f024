use std::time::Duration;

use crate::server::{TransportRequest, TransportResponse};

/// Hooks run around every request the pipeline handles.
///
/// `before` may short-circuit by returning a response; the stages are then
/// skipped but `after` still runs for every middleware.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &TransportRequest) -> Option<TransportResponse> {
        None
    }
    fn after(&self, _req: &TransportRequest, _res: &TransportResponse, _latency: Duration) {}
}
