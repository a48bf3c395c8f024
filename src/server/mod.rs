mod http_server;
mod pipeline;
mod request;
mod response;
mod service;
mod stages;

pub use http_server::{HttpServer, ServerHandle};
pub use pipeline::{Pipeline, Stage, StageOutcome};
pub use request::{parse_request, HeaderVec, TransportRequest, MAX_INLINE_HEADERS};
pub use response::{write_response, ContentType, TransportResponse};
pub use service::AppService;
pub use stages::{standard_pipeline, DynamicDispatchStage, HealthStage, MetricsStage};
