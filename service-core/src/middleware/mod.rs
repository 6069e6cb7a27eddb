pub mod metrics;
pub mod tracing;

pub use metrics::{metrics_middleware, render_metrics};
pub use self::tracing::{REQUEST_ID_HEADER, http_trace_layer, request_id_middleware};
