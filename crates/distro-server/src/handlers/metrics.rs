//! Metrics endpoint handler.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{MethodRouter, get},
};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler para el endpoint /metrics
pub async fn metrics_handler(State(prometheus): State<PrometheusHandle>) -> impl IntoResponse {
    prometheus.render()
}

/// Route serving the Prometheus exposition of `handle`.
pub fn metrics_route(handle: PrometheusHandle) -> MethodRouter {
    get(metrics_handler).with_state(handle)
}
