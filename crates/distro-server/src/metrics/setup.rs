//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::http::register_http_metrics;
use super::rebuild::register_rebuild_metrics;

/// Buckets para histogramas (en segundos).
///
/// Rebuilds take seconds, requests milliseconds; one set covers both.
const BUCKETS: &[f64] = &[
    0.001, // 1 milisegundo
    0.005, // 5 milisegundos
    0.025, // 25 milisegundos
    0.1,   // 100 milisegundos
    0.25,  // 250 milisegundos
    1.0,   // 1 segundo
    2.5,   // 2.5 segundos
    10.0,  // 10 segundos
    30.0,  // 30 segundos
    120.0, // 2 minutos
];

/// Instala el recorder global y retorna el handle para el endpoint `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(BUCKETS)?
        .install_recorder()?;

    register_http_metrics();
    register_rebuild_metrics();

    info!("Metrics system initialized");
    Ok(handle)
}
