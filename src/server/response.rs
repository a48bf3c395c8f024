use may_minihttp::Response;
use serde_json::{json, Value};

use crate::dispatcher::DispatchError;

/// Body media types the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    PlainText,
    Jpeg,
    Png,
    Gif,
    OctetStream,
}

impl ContentType {
    /// Media type for a file extension such as `.jpg`; the leading dot is
    /// optional. `None` or an unknown extension is an octet stream.
    #[must_use]
    pub fn from_extension(ext: Option<&str>) -> Self {
        let Some(ext) = ext else {
            return ContentType::OctetStream;
        };
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => ContentType::Jpeg,
            "png" => ContentType::Png,
            "gif" => ContentType::Gif,
            _ => ContentType::OctetStream,
        }
    }

    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::PlainText => "text/plain; version=0.0.4",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Png => "image/png",
            ContentType::Gif => "image/gif",
            ContentType::OctetStream => "application/octet-stream",
        }
    }

    /// Full header line, as `may_minihttp` wants a `&'static str`.
    fn header_line(self) -> &'static str {
        match self {
            ContentType::Json => "Content-Type: application/json",
            ContentType::PlainText => "Content-Type: text/plain; version=0.0.4",
            ContentType::Jpeg => "Content-Type: image/jpeg",
            ContentType::Png => "Content-Type: image/png",
            ContentType::Gif => "Content-Type: image/gif",
            ContentType::OctetStream => "Content-Type: application/octet-stream",
        }
    }
}

/// Response produced by the pipeline, written to the connection afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn bytes(content_type: ContentType, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: ContentType::Json,
            body: body.to_string().into_bytes(),
        }
    }

    #[must_use]
    pub fn text(body: String) -> Self {
        Self {
            status: 200,
            content_type: ContentType::PlainText,
            body: body.into_bytes(),
        }
    }

    /// 500 carrying `{"error": kind, "message": ...}`.
    #[must_use]
    pub fn dispatch_error(err: &DispatchError) -> Self {
        Self::json(
            500,
            &json!({ "error": err.kind(), "message": err.to_string() }),
        )
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::json(404, &json!({ "error": "Not Found" }))
    }
}

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Copy a [`TransportResponse`] onto the connection's response.
pub fn write_response(res: &mut Response, response: TransportResponse) {
    res.status_code(usize::from(response.status), status_reason(response.status));
    res.header(response.content_type.header_line());
    res.body_vec(response.body);
}
