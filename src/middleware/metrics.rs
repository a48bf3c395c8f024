use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::server::{TransportRequest, TransportResponse};

/// Prometheus-style counters for the HTTP pipeline and the dispatch stage.
///
/// All counters are relaxed atomics; readings are eventually consistent.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    stack_size: AtomicUsize,
    top_level_requests: AtomicUsize,
    dispatched: AtomicUsize,
    not_applicable: AtomicUsize,
    faults: AtomicUsize,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests seen by the pipeline
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean latency across all requests; zero before the first one.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Stack size of the last connection coroutine that served a request;
    /// zero until one has been recorded.
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Called from the connection coroutine, not from pipeline middleware,
    /// which runs on the tokio runtime.
    pub fn record_stack_size(&self, bytes: usize) {
        self.stack_size.store(bytes, Ordering::Relaxed);
    }

    /// Infrastructure endpoints such as `/health` and `/metrics`.
    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn top_level_request_count(&self) -> usize {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    /// A dynamic dispatch completed with a value.
    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// A path under the dispatch prefix fell through to later stages.
    pub fn inc_not_applicable(&self) {
        self.not_applicable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn not_applicable(&self) -> usize {
        self.not_applicable.load(Ordering::Relaxed)
    }

    /// A dispatch failed with a fatal error.
    pub fn inc_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }

    /// Render all counters in the Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        let samples: [(&str, &str, &str, String); 7] = [
            (
                "dyndispatch_requests_total",
                "counter",
                "Total number of handled requests",
                self.request_count().to_string(),
            ),
            (
                "dyndispatch_request_latency_seconds",
                "gauge",
                "Average request latency in seconds",
                self.average_latency().as_secs_f64().to_string(),
            ),
            (
                "dyndispatch_top_level_requests_total",
                "counter",
                "Requests served by infrastructure endpoints",
                self.top_level_request_count().to_string(),
            ),
            (
                "dyndispatch_dispatched_total",
                "counter",
                "Dynamic dispatches that produced a value",
                self.dispatched().to_string(),
            ),
            (
                "dyndispatch_not_applicable_total",
                "counter",
                "Dynamic paths that fell through to later stages",
                self.not_applicable().to_string(),
            ),
            (
                "dyndispatch_faults_total",
                "counter",
                "Dynamic dispatches that failed",
                self.faults().to_string(),
            ),
            (
                "dyndispatch_coroutine_stack_bytes",
                "gauge",
                "Stack size of the connection coroutine serving requests",
                self.stack_size().to_string(),
            ),
        ];
        for (name, kind, help, value) in samples {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
            ));
        }
        out
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &TransportRequest) -> Option<TransportResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &TransportRequest, _res: &TransportResponse, latency: Duration) {
        self.total_latency_ns.fetch_add(
            u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }
}
