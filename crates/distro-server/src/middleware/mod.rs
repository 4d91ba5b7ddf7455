//! Middleware stack para el servidor HTTP.
//!
//! Every request passes through:
//! - `RequestIdLayer`: generates or propagates `x-request-id`
//! - `LoggingLayer`: one span per request, with the matched route and status

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};
