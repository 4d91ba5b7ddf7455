//! HTTP metrics middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use std::time::Instant;

use crate::routing::MatchedRoute;

/// Label for requests no route matched.
const UNMATCHED: &str = "unmatched";

/// Middleware que registra metricas HTTP para cada request.
///
/// The path label is the route pattern the snapshot dispatched to, never the
/// raw request path.
pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    let path = response
        .extensions()
        .get::<MatchedRoute>()
        .map(|m| m.pattern().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());
    let status = response.status().as_u16().to_string();
    let duration = start.elapsed();

    // Registrar metricas
    counter!(
        "distro_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "distro_http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration.as_secs_f64());

    response
}

/// Registra las metricas HTTP
pub fn register_http_metrics() {
    metrics::describe_counter!(
        "distro_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "distro_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
}
