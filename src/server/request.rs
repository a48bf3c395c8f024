use std::io::Read;
use std::sync::Arc;

use http::Method;
use may_minihttp::Request;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::ids::RequestId;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage; names are lowercased.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Transport-neutral view of an inbound request: everything the pipeline
/// needs, detached from the connection so it can move to a dispatch task.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl TransportRequest {
    /// Build a request from a method and a raw target (`/path?query`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            request_id: RequestId::new(),
            method,
            path,
            query,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    /// Header lookup (case-insensitive per RFC 7230).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

/// Detach a `may_minihttp` request into a [`TransportRequest`].
pub fn parse_request(req: Request) -> TransportRequest {
    let method = Method::from_bytes(req.method().as_bytes()).unwrap_or_else(|_| {
        warn!(method = req.method(), "unrecognised HTTP method; treating as GET");
        Method::GET
    });
    let (path, query) = split_target(req.path());

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let mut body = Vec::new();
    if let Err(err) = req.body().read_to_end(&mut body) {
        warn!(error = %err, "failed to read request body");
        body.clear();
    }

    let request_id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k.as_ref() == "x-request-id")
            .map(|(_, v)| v.as_str()),
    );

    debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_bytes = body.len(),
        "HTTP request parsed"
    );

    TransportRequest {
        request_id,
        method,
        path,
        query,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_query_from_path() {
        let req = TransportRequest::new(Method::GET, "/dynamic/account/photo/1.jpg?size=s");
        assert_eq!(req.path, "/dynamic/account/photo/1.jpg");
        assert_eq!(req.query.as_deref(), Some("size=s"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = TransportRequest::new(Method::GET, "/").with_header("X-Request-Id", "abc");
        assert_eq!(req.get_header("x-request-id"), Some("abc"));
        assert_eq!(req.get_header("X-REQUEST-ID"), Some("abc"));
        assert_eq!(req.get_header("accept"), None);
    }
}
